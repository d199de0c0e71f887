//! Slope calculation from DEMs
//!
//! Calculates the rate of change of elevation using the Horn (1981) method,
//! a Sobel-weighted 3x3 finite difference, with independent x and y pixel
//! spacing taken from the geotransform.

use crate::maybe_rayon::*;
use ndarray::Array2;
use rusle_core::raster::Raster;
use rusle_core::{Algorithm, Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Units for slope output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlopeUnits {
    /// Degrees (0-90)
    #[default]
    Degrees,
    /// Percent (0-infinity, typically 0-100+)
    Percent,
    /// Radians (0-π/2)
    Radians,
}

/// Parameters for slope calculation
#[derive(Debug, Clone, Default)]
pub struct SlopeParams {
    pub units: SlopeUnits,
}

/// Slope algorithm
#[derive(Debug, Clone, Default)]
pub struct Slope;

impl Algorithm for Slope {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = SlopeParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Slope"
    }

    fn description(&self) -> &'static str {
        "Calculate slope from a metric DEM using Horn's method"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        slope(&input, params)
    }
}

/// Horn slope in radians at an interior cell; `None` when any cell of the
/// 3x3 window is no-data
#[inline]
fn horn_slope(dem: &Raster<f64>, row: usize, col: usize, sx8: f64, sy8: f64) -> Option<f64> {
    let at = |dr: isize, dc: isize| dem.value_at_offset(row, col, dr, dc);

    // a b c
    // d e f
    // g h i
    let a = at(-1, -1)?;
    let b = at(-1, 0)?;
    let c = at(-1, 1)?;
    let d = at(0, -1)?;
    at(0, 0)?;
    let f = at(0, 1)?;
    let g = at(1, -1)?;
    let h = at(1, 0)?;
    let i = at(1, 1)?;

    let dz_dx = ((c + 2.0 * f + i) - (a + 2.0 * d + g)) / sx8;
    let dz_dy = ((g + 2.0 * h + i) - (a + 2.0 * b + c)) / sy8;

    Some(dz_dx.hypot(dz_dy).atan())
}

/// Calculate slope from a DEM on a metric grid
///
/// ```text
/// dz/dx = ((c + 2f + i) - (a + 2d + g)) / (8 * spacing_x)
/// dz/dy = ((g + 2h + i) - (a + 2b + c)) / (8 * spacing_y)
/// slope = atan(hypot(dz/dx, dz/dy))
/// ```
///
/// The outermost ring of cells, and every cell whose 3x3 window touches
/// no-data, is no-data in the output. Valid values are never negative.
pub fn slope(dem: &Raster<f64>, params: SlopeParams) -> Result<Raster<f64>> {
    let (rows, cols) = dem.shape();
    let gt = dem.transform();
    if gt.is_degenerate() {
        return Err(Error::DegenerateTransform(format!(
            "cannot take slope on pixel spacing {} x {}",
            gt.spacing_x(),
            gt.spacing_y()
        )));
    }
    let sx8 = 8.0 * gt.spacing_x();
    let sy8 = 8.0 * gt.spacing_y();

    let values: Vec<Option<f64>> = (0..rows)
        .into_par_iter()
        .map(|row| {
            (0..cols)
                .map(|col| {
                    if dem.is_border(row, col) {
                        return None;
                    }
                    let rad = horn_slope(dem, row, col, sx8, sy8)?;
                    Some(match params.units {
                        SlopeUnits::Degrees => rad.to_degrees(),
                        SlopeUnits::Percent => rad.tan() * 100.0,
                        SlopeUnits::Radians => rad,
                    })
                })
                .collect::<Vec<_>>()
        })
        .flatten()
        .collect();

    let valid = Array2::from_shape_vec((rows, cols), values.iter().map(Option::is_some).collect())
        .map_err(|e| Error::Other(e.to_string()))?;
    let filled: Vec<f64> = values.into_iter().map(|v| v.unwrap_or(0.0)).collect();
    let data = Array2::from_shape_vec((rows, cols), filled)
        .map_err(|e| Error::Other(e.to_string()))?;

    let mut output = dem.with_data(data, valid)?;
    output.set_nodata(dem.nodata());
    debug!(valid = output.valid_count(), units = ?params.units, "computed slope");
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rusle_core::GeoTransform;

    fn plane(rows: usize, cols: usize, sx: f64, sy: f64, fx: f64, fy: f64) -> Raster<f64> {
        // z = fx * x + fy * y in map units, y growing north
        let mut dem = Raster::new(rows, cols);
        dem.set_transform(GeoTransform::new(0.0, rows as f64 * sy, sx, -sy));
        for row in 0..rows {
            for col in 0..cols {
                let (x, y) = dem.pixel_to_geo(col, row);
                dem.set(row, col, fx * x + fy * y).unwrap();
            }
        }
        dem
    }

    #[test]
    fn test_slope_flat() {
        let mut dem: Raster<f64> = Raster::filled(10, 10, 100.0);
        dem.set_transform(GeoTransform::new(0.0, 10.0, 1.0, -1.0));
        let result = slope(&dem, SlopeParams::default()).unwrap();
        assert_relative_eq!(result.value(5, 5).unwrap(), 0.0);
    }

    #[test]
    fn test_slope_45_degrees() {
        let dem = plane(6, 6, 30.0, 30.0, 1.0, 0.0);
        let result = slope(&dem, SlopeParams::default()).unwrap();
        assert_relative_eq!(result.value(2, 3).unwrap(), 45.0, epsilon = 1e-9);
    }

    #[test]
    fn test_slope_uses_separate_spacing() {
        // 10% grade northward on a grid with rectangular pixels
        let dem = plane(6, 6, 20.0, 30.0, 0.0, 0.1);
        let result = slope(&dem, SlopeParams { units: SlopeUnits::Percent }).unwrap();
        assert_relative_eq!(result.value(3, 3).unwrap(), 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_border_is_nodata() {
        let dem = plane(5, 5, 1.0, 1.0, 0.5, 0.5);
        let result = slope(&dem, SlopeParams::default()).unwrap();
        for i in 0..5 {
            assert_eq!(result.value(0, i), None);
            assert_eq!(result.value(4, i), None);
            assert_eq!(result.value(i, 0), None);
            assert_eq!(result.value(i, 4), None);
        }
        assert_eq!(result.valid_count(), 9);
    }

    #[test]
    fn test_nodata_neighbourhood() {
        let mut dem = plane(5, 5, 1.0, 1.0, 0.5, 0.0);
        dem.set_invalid(2, 2).unwrap();
        let result = slope(&dem, SlopeParams::default()).unwrap();
        // every interior cell touches (2,2)
        assert_eq!(result.valid_count(), 0);
    }

    #[test]
    fn test_degenerate_transform() {
        let mut dem: Raster<f64> = Raster::filled(4, 4, 1.0);
        dem.set_transform(GeoTransform::new(0.0, 0.0, 0.0, 0.0));
        assert!(matches!(
            slope(&dem, SlopeParams::default()),
            Err(Error::DegenerateTransform(_))
        ));
    }

    #[test]
    fn algorithm_trait_matches_free_function() {
        let dem = plane(6, 6, 30.0, 30.0, 1.0, 0.0);
        let out = Slope.execute_default(dem).unwrap();
        assert_eq!(Slope.name(), "Slope");
        assert_relative_eq!(out.value(2, 3).unwrap(), 45.0, epsilon = 1e-9);
    }
}
