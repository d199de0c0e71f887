//! RUSLE LS-factor (topographic factor)
//!
//! ```text
//! A  = max(acc, 1) × cell_size
//! L  = (A / 22.13)^m
//! S  = sin(max(β, β_min))^n
//! LS = L × S
//! ```
//!
//! where `acc` is D8 flow accumulation in cells and β the slope angle.
//! 22.13 m is the length of the RUSLE unit plot.

use crate::maybe_rayon::*;
use ndarray::Array2;
use rusle_core::raster::Raster;
use rusle_core::{Algorithm, Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Length of the RUSLE unit plot in metres
pub const UNIT_PLOT_LENGTH: f64 = 22.13;

/// Parameters for the LS-factor
#[derive(Debug, Clone)]
pub struct LsParams {
    /// Slope-length exponent (default 0.4)
    pub m_exponent: f64,
    /// Slope-steepness exponent (default 1.3)
    pub n_exponent: f64,
    /// Slope floor in degrees applied before `sin` (default 0.1)
    pub min_slope_degrees: f64,
    /// Cell size in metres; the accumulation grid's pixel width when `None`
    pub cell_size: Option<f64>,
}

impl Default for LsParams {
    fn default() -> Self {
        Self {
            m_exponent: 0.4,
            n_exponent: 1.3,
            min_slope_degrees: 0.1,
            cell_size: None,
        }
    }
}

impl LsParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.m_exponent > 0.0 && self.m_exponent.is_finite()) {
            return Err(invalid("m_exponent", self.m_exponent, "must be positive"));
        }
        if !(self.n_exponent > 0.0 && self.n_exponent.is_finite()) {
            return Err(invalid("n_exponent", self.n_exponent, "must be positive"));
        }
        let floor = self.min_slope_degrees;
        if !(floor > 0.0 && floor < 90.0) {
            return Err(invalid("min_slope_degrees", floor, "must be in (0, 90)"));
        }
        if let Some(cs) = self.cell_size {
            if !(cs > 0.0 && cs.is_finite()) {
                return Err(invalid("cell_size", cs, "must be positive"));
            }
        }
        Ok(())
    }
}

fn invalid(name: &'static str, value: f64, reason: &str) -> Error {
    Error::InvalidParameter {
        name,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Corrections applied while synthesising LS
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LsCorrections {
    /// Negative values forced to zero
    pub negative_clamped: usize,
    /// Non-finite values marked no-data
    pub non_finite: usize,
    /// Cells whose slope was raised to the floor
    pub slope_floor_applied: usize,
    /// Cells with valid accumulation but no slope, computed at the floor
    pub missing_slope: usize,
}

/// LS-factor algorithm
#[derive(Debug, Clone, Default)]
pub struct LsFactor;

impl Algorithm for LsFactor {
    type Input = (Raster<f64>, Raster<f64>);
    type Output = (Raster<f64>, LsCorrections);
    type Params = LsParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "LS Factor"
    }

    fn description(&self) -> &'static str {
        "RUSLE topographic factor from flow accumulation and slope"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let (acc, slope_deg) = input;
        ls_factor(&acc, &slope_deg, &params)
    }
}

enum CellOutcome {
    Value { ls: f64, floored: bool, missing: bool },
    NonFinite,
    NoData,
}

/// Compute the LS-factor.
///
/// # Arguments
/// * `acc` - Flow accumulation (cell counts)
/// * `slope_deg` - Slope in degrees on the same grid
///
/// A cell is valid in the output iff its accumulation is valid. Missing
/// slope at such a cell is taken as the floor. Invalid cells hold 0.0.
pub fn ls_factor(
    acc: &Raster<f64>,
    slope_deg: &Raster<f64>,
    params: &LsParams,
) -> Result<(Raster<f64>, LsCorrections)> {
    params.validate()?;

    let (rows, cols) = acc.shape();
    let (rows_s, cols_s) = slope_deg.shape();
    if rows != rows_s || cols != cols_s {
        return Err(Error::SizeMismatch {
            er: rows,
            ec: cols,
            ar: rows_s,
            ac: cols_s,
        });
    }
    if let (Some(a), Some(b)) = (acc.crs(), slope_deg.crs()) {
        if !a.is_equivalent(b) {
            return Err(Error::CrsMismatch(a.identifier(), b.identifier()));
        }
    }

    let cell_size = params.cell_size.unwrap_or_else(|| acc.cell_size());
    if !(cell_size > 0.0 && cell_size.is_finite()) {
        return Err(Error::DegenerateTransform(format!(
            "cell size {cell_size} cannot scale contributing area"
        )));
    }

    let m = params.m_exponent;
    let n = params.n_exponent;
    let floor = params.min_slope_degrees;

    let outcomes: Vec<CellOutcome> = (0..rows)
        .into_par_iter()
        .map(|row| {
            (0..cols)
                .map(|col| {
                    let Some(a) = acc.value(row, col) else {
                        return CellOutcome::NoData;
                    };
                    let (beta, floored, missing) = match slope_deg.value(row, col) {
                        Some(s) if s >= floor => (s, false, false),
                        Some(_) => (floor, true, false),
                        None => (floor, false, true),
                    };

                    let area = a.max(1.0) * cell_size;
                    let l = (area / UNIT_PLOT_LENGTH).powf(m);
                    let s = beta.to_radians().sin().powf(n);
                    let ls = l * s;
                    if ls.is_finite() {
                        CellOutcome::Value { ls, floored, missing }
                    } else {
                        CellOutcome::NonFinite
                    }
                })
                .collect::<Vec<_>>()
        })
        .flatten()
        .collect();

    let mut corrections = LsCorrections::default();
    let mut data = Vec::with_capacity(rows * cols);
    let mut valid = Vec::with_capacity(rows * cols);
    for outcome in outcomes {
        match outcome {
            CellOutcome::Value { ls, floored, missing } => {
                corrections.slope_floor_applied += floored as usize;
                corrections.missing_slope += missing as usize;
                data.push(ls);
                valid.push(true);
            }
            CellOutcome::NonFinite => {
                corrections.non_finite += 1;
                data.push(0.0);
                valid.push(false);
            }
            CellOutcome::NoData => {
                data.push(0.0);
                valid.push(false);
            }
        }
    }

    let data = Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    let valid = Array2::from_shape_vec((rows, cols), valid)
        .map_err(|e| Error::Other(e.to_string()))?;
    let mut output = acc.with_data(data, valid)?;

    if corrections.non_finite > 0 {
        warn!(cells = corrections.non_finite, "non-finite LS values marked as no-data");
    }
    corrections.negative_clamped = clamp_negative(&mut output)?;

    debug!(
        cell_size,
        m,
        n,
        floored = corrections.slope_floor_applied,
        missing_slope = corrections.missing_slope,
        "computed LS factor"
    );
    Ok((output, corrections))
}

/// Force negative valid values to zero; returns how many were changed
pub fn clamp_negative(raster: &mut Raster<f64>) -> Result<usize> {
    let negatives: Vec<(usize, usize)> = raster
        .iter_valid()
        .filter(|&(_, v)| v < 0.0)
        .map(|(pos, _)| pos)
        .collect();

    for &(row, col) in &negatives {
        raster.set(row, col, 0.0)?;
    }
    if !negatives.is_empty() {
        warn!(cells = negatives.len(), "negative LS values clamped to zero");
    }
    Ok(negatives.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rusle_core::{GeoTransform, CRS};

    fn grid(values: &[f64], rows: usize, cols: usize, cell: f64) -> Raster<f64> {
        let mut r = Raster::from_vec(values.to_vec(), rows, cols).unwrap();
        r.set_transform(GeoTransform::new(0.0, rows as f64 * cell, cell, -cell));
        r
    }

    #[test]
    fn matches_closed_form() {
        let acc = grid(&[10.0], 1, 1, 30.0);
        let slope = grid(&[5.0], 1, 1, 30.0);
        let (ls, corrections) = ls_factor(&acc, &slope, &LsParams::default()).unwrap();

        let expected = (300.0_f64 / 22.13).powf(0.4) * 5.0_f64.to_radians().sin().powf(1.3);
        assert_relative_eq!(ls.value(0, 0).unwrap(), expected, epsilon = 1e-12);
        assert_eq!(corrections, LsCorrections::default());
    }

    #[test]
    fn flat_terrain_gives_floor_constant() {
        let acc = grid(&[1.0; 4], 2, 2, 10.0);
        let slope = grid(&[0.0; 4], 2, 2, 10.0);
        let (ls, corrections) = ls_factor(&acc, &slope, &LsParams::default()).unwrap();

        let expected = (10.0_f64 / 22.13).powf(0.4) * 0.1_f64.to_radians().sin().powf(1.3);
        for (_, v) in ls.iter_valid() {
            assert_relative_eq!(v, expected, epsilon = 1e-12);
        }
        assert_eq!(corrections.slope_floor_applied, 4);
    }

    #[test]
    fn increases_with_accumulation() {
        let acc = grid(&[1.0, 4.0, 9.0], 1, 3, 10.0);
        let slope = grid(&[3.0, 3.0, 3.0], 1, 3, 10.0);
        let (ls, _) = ls_factor(&acc, &slope, &LsParams::default()).unwrap();
        let a = ls.value(0, 0).unwrap();
        let b = ls.value(0, 1).unwrap();
        let c = ls.value(0, 2).unwrap();
        assert!(a < b && b < c);
    }

    #[test]
    fn missing_slope_uses_floor_and_nodata_acc_stays_nodata() {
        let mut acc = grid(&[2.0, 2.0], 1, 2, 10.0);
        let mut slope = grid(&[0.0, 0.0], 1, 2, 10.0);
        slope.set_invalid(0, 0).unwrap();
        acc.set_invalid(0, 1).unwrap();
        let (ls, corrections) = ls_factor(&acc, &slope, &LsParams::default()).unwrap();

        assert!(ls.value(0, 0).unwrap() > 0.0);
        assert_eq!(ls.value(0, 1), None);
        assert_eq!(ls.data()[(0, 1)], 0.0);
        assert_eq!(corrections.missing_slope, 1);
    }

    #[test]
    fn cell_size_override() {
        let acc = grid(&[1.0], 1, 1, 1.0);
        let slope = grid(&[10.0], 1, 1, 1.0);
        let params = LsParams {
            cell_size: Some(22.13),
            m_exponent: 0.5,
            ..LsParams::default()
        };
        let (ls, _) = ls_factor(&acc, &slope, &params).unwrap();
        let expected = 10.0_f64.to_radians().sin().powf(1.3);
        assert_relative_eq!(ls.value(0, 0).unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn size_mismatch_is_rejected() {
        let acc = grid(&[1.0; 4], 2, 2, 1.0);
        let slope = grid(&[1.0; 6], 2, 3, 1.0);
        assert!(matches!(
            ls_factor(&acc, &slope, &LsParams::default()),
            Err(Error::SizeMismatch { .. })
        ));

        let mut acc = grid(&[1.0; 4], 2, 2, 1.0);
        let mut slope = grid(&[1.0; 4], 2, 2, 1.0);
        acc.set_crs(Some(CRS::from_epsg(32643)));
        slope.set_crs(Some(CRS::from_epsg(32644)));
        assert!(matches!(
            ls_factor(&acc, &slope, &LsParams::default()),
            Err(Error::CrsMismatch(..))
        ));
    }

    #[test]
    fn invalid_parameters() {
        for params in [
            LsParams { m_exponent: 0.0, ..LsParams::default() },
            LsParams { n_exponent: -1.0, ..LsParams::default() },
            LsParams { min_slope_degrees: 90.0, ..LsParams::default() },
            // a zero floor would let flat cells produce S = 0
            LsParams { min_slope_degrees: 0.0, ..LsParams::default() },
            LsParams { cell_size: Some(0.0), ..LsParams::default() },
        ] {
            assert!(matches!(params.validate(), Err(Error::InvalidParameter { .. })));
        }
    }

    #[test]
    fn clamp_negative_counts() {
        let mut r = grid(&[-1.0, 2.0, -0.5, 0.0], 2, 2, 1.0);
        r.set_invalid(1, 1).unwrap();
        assert_eq!(clamp_negative(&mut r).unwrap(), 2);
        assert_eq!(r.value(0, 0), Some(0.0));
        assert_eq!(r.value(1, 0), Some(0.0));
        assert_eq!(r.value(0, 1), Some(2.0));
    }

    #[test]
    fn algorithm_trait_matches_free_function() {
        let acc = grid(&[10.0], 1, 1, 30.0);
        let slope = grid(&[5.0], 1, 1, 30.0);
        let (ls, corrections) = LsFactor.execute_default((acc.clone(), slope.clone())).unwrap();
        let (direct, _) = ls_factor(&acc, &slope, &LsParams::default()).unwrap();
        assert_eq!(ls.value(0, 0), direct.value(0, 0));
        assert_eq!(corrections, LsCorrections::default());
    }
}
