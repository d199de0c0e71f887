//! D8 flow direction
//!
//! Each valid cell drains to the neighbour with the strictly largest
//! elevation drop (own elevation minus neighbour elevation). Drops are raw
//! elevation differences, not divided by the neighbour distance.
//!
//! Ties go to the first neighbour in [`Direction::PRIORITY`], row-major over
//! the 3x3 window:
//! ```text
//!   1  2  3
//!   4  .  5
//!   6  7  8
//! ```
//! A cell without a strictly positive drop (flat or unresolved pit) is
//! [`FlowDir::Undefined`] and acts as a terminal sink during accumulation.

use crate::maybe_rayon::*;
use ndarray::Array2;
use rusle_core::raster::{Direction, FlowDir, FlowDirectionGrid, Raster};
use rusle_core::{Algorithm, Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How cells on the outermost ring of the grid are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgePolicy {
    /// Border cells always have an undefined direction
    #[default]
    Exclude,
    /// Border cells route to their in-bounds neighbours like any other cell
    InBounds,
}

/// Parameters for flow direction
#[derive(Debug, Clone, Default)]
pub struct FlowDirectionParams {
    pub edge_policy: EdgePolicy,
}

/// Flow direction algorithm (D8)
#[derive(Debug, Clone, Default)]
pub struct FlowDirection;

impl Algorithm for FlowDirection {
    type Input = Raster<f64>;
    type Output = FlowDirectionGrid;
    type Params = FlowDirectionParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Flow Direction (D8)"
    }

    fn description(&self) -> &'static str {
        "Assign each cell its steepest-descent neighbour"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        flow_direction(&input, &params)
    }
}

/// Steepest-descent direction of a single cell
#[inline]
pub fn resolve_direction(
    dem: &Raster<f64>,
    row: usize,
    col: usize,
    edge_policy: EdgePolicy,
) -> FlowDir {
    let Some(z) = dem.value(row, col) else {
        return FlowDir::Undefined;
    };
    if edge_policy == EdgePolicy::Exclude && dem.is_border(row, col) {
        return FlowDir::Undefined;
    }

    let mut max_drop = 0.0_f64;
    let mut best = FlowDir::Undefined;
    for dir in Direction::PRIORITY {
        let (dr, dc) = dir.offset();
        let Some(nz) = dem.value_at_offset(row, col, dr, dc) else {
            continue;
        };
        let drop = z - nz;
        if drop > max_drop {
            max_drop = drop;
            best = FlowDir::Toward(dir);
        }
    }
    best
}

/// Compute D8 flow directions for a (filled) DEM.
///
/// The output carries the DEM's validity and georeferencing.
pub fn flow_direction(
    dem: &Raster<f64>,
    params: &FlowDirectionParams,
) -> Result<FlowDirectionGrid> {
    let (rows, cols) = dem.shape();
    let edge_policy = params.edge_policy;

    let dirs: Vec<FlowDir> = (0..rows)
        .into_par_iter()
        .map(|row| {
            (0..cols)
                .map(|col| resolve_direction(dem, row, col, edge_policy))
                .collect::<Vec<_>>()
        })
        .flatten()
        .collect();

    let dirs = Array2::from_shape_vec((rows, cols), dirs).map_err(|e| Error::Other(e.to_string()))?;
    let grid = FlowDirectionGrid::from_parts(dirs, dem.validity().clone())?.with_meta_of(dem);

    debug!(
        valid = grid.valid_count(),
        defined = grid.defined_count(),
        ?edge_policy,
        "resolved flow directions"
    );
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusle_core::GeoTransform;

    fn dem_from(values: &[f64], rows: usize, cols: usize) -> Raster<f64> {
        let mut dem = Raster::from_vec(values.to_vec(), rows, cols).unwrap();
        dem.set_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0));
        dem
    }

    #[test]
    fn steepest_drop_wins() {
        #[rustfmt::skip]
        let dem = dem_from(&[
            9.0, 9.0, 9.0,
            9.0, 5.0, 4.0,
            9.0, 2.0, 3.0,
        ], 3, 3);
        let grid = flow_direction(&dem, &FlowDirectionParams::default()).unwrap();
        assert_eq!(grid.dir(1, 1), FlowDir::Toward(Direction::South));
    }

    #[test]
    fn ties_follow_row_major_priority() {
        #[rustfmt::skip]
        let dem = dem_from(&[
            9.0, 1.0, 1.0,
            1.0, 5.0, 1.0,
            1.0, 1.0, 1.0,
        ], 3, 3);
        let grid = flow_direction(&dem, &FlowDirectionParams::default()).unwrap();
        // N, NE, W, E, SW, S, SE all drop by 4; N comes first after NW
        assert_eq!(grid.dir(1, 1), FlowDir::Toward(Direction::North));
    }

    #[test]
    fn flat_cell_is_undefined() {
        let dem = Raster::filled(3, 3, 10.0);
        let grid = flow_direction(&dem, &FlowDirectionParams::default()).unwrap();
        assert_eq!(grid.dir(1, 1), FlowDir::Undefined);
        assert_eq!(grid.defined_count(), 0);
    }

    #[test]
    fn border_policy() {
        #[rustfmt::skip]
        let dem = dem_from(&[
            3.0, 2.0, 1.0,
            4.0, 3.0, 2.0,
            5.0, 4.0, 3.0,
        ], 3, 3);
        let excluded = flow_direction(&dem, &FlowDirectionParams::default()).unwrap();
        assert_eq!(excluded.dir(0, 0), FlowDir::Undefined);
        assert_eq!(excluded.dir(1, 1), FlowDir::Toward(Direction::NorthEast));

        let params = FlowDirectionParams {
            edge_policy: EdgePolicy::InBounds,
        };
        let in_bounds = flow_direction(&dem, &params).unwrap();
        assert_eq!(in_bounds.dir(0, 0), FlowDir::Toward(Direction::East));
        assert_eq!(in_bounds.dir(0, 2), FlowDir::Undefined);
    }

    #[test]
    fn nodata_neighbours_are_skipped() {
        #[rustfmt::skip]
        let mut dem = dem_from(&[
            5.0, 5.0, 5.0,
            5.0, 4.0, 0.0,
            5.0, 5.0, 3.0,
        ], 3, 3);
        dem.set_invalid(1, 2).unwrap();
        let grid = flow_direction(&dem, &FlowDirectionParams::default()).unwrap();
        assert_eq!(grid.dir(1, 1), FlowDir::Toward(Direction::SouthEast));
        assert!(!grid.is_valid(1, 2));
    }

    #[test]
    fn never_points_uphill() {
        let mut dem = Raster::new(8, 8);
        for row in 0..8 {
            for col in 0..8 {
                let z = ((row * 31 + col * 17) % 11) as f64;
                dem.set(row, col, z).unwrap();
            }
        }
        let grid = flow_direction(&dem, &FlowDirectionParams::default()).unwrap();
        for row in 0..8 {
            for col in 0..8 {
                if let Some((tr, tc)) = grid.target(row, col) {
                    assert!(dem.value(tr, tc).unwrap() < dem.value(row, col).unwrap());
                }
            }
        }
    }

    #[test]
    fn algorithm_trait_matches_free_function() {
        #[rustfmt::skip]
        let dem = dem_from(&[
            9.0, 9.0, 9.0,
            9.0, 5.0, 4.0,
            9.0, 2.0, 3.0,
        ], 3, 3);
        let params = FlowDirectionParams { edge_policy: EdgePolicy::InBounds };
        let grid = FlowDirection.execute(dem.clone(), params.clone()).unwrap();
        let direct = flow_direction(&dem, &params).unwrap();
        assert_eq!(grid.defined_count(), direct.defined_count());
        assert_eq!(grid.dir(1, 1), FlowDir::Toward(Direction::South));
    }
}
