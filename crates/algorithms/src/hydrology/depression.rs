//! Depression filling
//!
//! Two methods are available:
//!
//! - [`DepressionMethod::NeighborMean`]: a bounded local heuristic. Each pass
//!   raises every interior single-cell pit (no valid neighbour lower or equal)
//!   to the mean of its valid 8-neighbours. A fixed, small number of passes
//!   resolves isolated pits; depressions wider than one cell may survive and
//!   their cells later get an undefined flow direction.
//! - [`DepressionMethod::PriorityFlood`]: complete filling after Barnes et al.
//!   (2014), see [`priority_flood`](super::priority_flood).

use crate::maybe_rayon::*;
use rusle_core::raster::{Direction, Raster};
use rusle_core::{Algorithm, Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::priority_flood::priority_flood;

/// Depression-filling method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepressionMethod {
    #[default]
    NeighborMean,
    PriorityFlood,
}

/// Parameters for depression filling
#[derive(Debug, Clone)]
pub struct FillParams {
    pub method: DepressionMethod,
    /// Passes of the neighbour-mean heuristic
    pub passes: usize,
    /// Minimum rise enforced across filled flats (priority flood only)
    pub epsilon: f64,
}

impl Default for FillParams {
    fn default() -> Self {
        Self {
            method: DepressionMethod::NeighborMean,
            passes: 2,
            epsilon: 1e-5,
        }
    }
}

/// What depression filling changed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FillReport {
    pub method: DepressionMethod,
    /// Single-cell pits in the input
    pub initial_pits: usize,
    /// Cell updates applied (a cell raised on two passes counts twice)
    pub cells_raised: usize,
    /// Single-cell pits left after filling
    pub residual_pits: usize,
    /// Passes actually run
    pub passes_run: usize,
    /// Cells whose filled value was not finite and were marked no-data
    pub demoted_cells: usize,
}

/// Depression filler
#[derive(Debug, Clone, Default)]
pub struct DepressionFill;

impl Algorithm for DepressionFill {
    type Input = Raster<f64>;
    type Output = (Raster<f64>, FillReport);
    type Params = FillParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Depression Fill"
    }

    fn description(&self) -> &'static str {
        "Raise single-cell pits toward their neighbour mean, or priority-flood fill"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        fill_depressions(&input, &params)
    }
}

/// Mean of the valid 8-neighbours of an interior cell if it is a pit.
///
/// A pit is a valid, non-border cell with at least one valid neighbour and
/// every valid neighbour strictly higher.
fn pit_neighbour_mean(dem: &Raster<f64>, row: usize, col: usize) -> Option<f64> {
    if dem.is_border(row, col) {
        return None;
    }
    let z = dem.value(row, col)?;

    let mut sum = 0.0;
    let mut n = 0usize;
    for dir in Direction::ALL {
        let (dr, dc) = dir.offset();
        if let Some(nz) = dem.value_at_offset(row, col, dr, dc) {
            if nz <= z {
                return None;
            }
            sum += nz;
            n += 1;
        }
    }
    (n > 0).then(|| sum / n as f64)
}

/// Number of single-cell pits in `dem`
pub fn count_pits(dem: &Raster<f64>) -> usize {
    let (rows, cols) = dem.shape();
    (0..rows)
        .into_par_iter()
        .map(|row| {
            (0..cols)
                .filter(|&col| pit_neighbour_mean(dem, row, col).is_some())
                .count()
        })
        .sum()
}

/// Fill depressions in `dem` with the configured method.
///
/// The input is not modified. No-data cells stay no-data and never take
/// part in neighbour means.
pub fn fill_depressions(
    dem: &Raster<f64>,
    params: &FillParams,
) -> Result<(Raster<f64>, FillReport)> {
    if params.method == DepressionMethod::PriorityFlood && !(params.epsilon >= 0.0) {
        return Err(Error::InvalidParameter {
            name: "epsilon",
            value: params.epsilon.to_string(),
            reason: "must be non-negative".to_string(),
        });
    }

    let initial_pits = count_pits(dem);
    debug!(initial_pits, method = ?params.method, "filling depressions");

    let (mut filled, cells_raised, passes_run) = match params.method {
        DepressionMethod::NeighborMean => neighbor_mean_fill(dem, params.passes)?,
        DepressionMethod::PriorityFlood => {
            let (filled, raised) = priority_flood(dem, params.epsilon)?;
            (filled, raised, 1)
        }
    };

    let mut demoted_cells = 0usize;
    filled.retain_valid(|_, _, z| {
        let ok = z.is_finite();
        if !ok {
            demoted_cells += 1;
        }
        ok
    });
    if demoted_cells > 0 {
        warn!(demoted_cells, "non-finite elevations after filling marked as no-data");
    }

    let residual_pits = count_pits(&filled);
    if residual_pits > 0 {
        warn!(
            residual_pits,
            passes = passes_run,
            "unresolved pits remain; their flow direction will be undefined"
        );
    }

    info!(initial_pits, cells_raised, residual_pits, "depression fill complete");

    Ok((
        filled,
        FillReport {
            method: params.method,
            initial_pits,
            cells_raised,
            residual_pits,
            passes_run,
            demoted_cells,
        },
    ))
}

/// Bounded neighbour-mean heuristic. Each pass reads the previous pass's
/// surface, so pits resolved in one pass do not influence their
/// neighbours until the next.
fn neighbor_mean_fill(dem: &Raster<f64>, passes: usize) -> Result<(Raster<f64>, usize, usize)> {
    let (rows, cols) = dem.shape();
    let mut current = dem.clone();
    let mut raised = 0usize;
    let mut passes_run = 0usize;

    for _ in 0..passes {
        let updates: Vec<(usize, usize, f64)> = (0..rows)
            .into_par_iter()
            .map(|row| {
                (0..cols)
                    .filter_map(|col| pit_neighbour_mean(&current, row, col).map(|z| (row, col, z)))
                    .collect::<Vec<_>>()
            })
            .flatten()
            .collect();

        passes_run += 1;
        if updates.is_empty() {
            break;
        }
        raised += updates.len();
        for (row, col, z) in updates {
            current.set(row, col, z)?;
        }
    }

    Ok((current, raised, passes_run))
}
