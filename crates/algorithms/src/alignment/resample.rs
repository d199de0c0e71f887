//! Resampling a raster onto a target grid specification

use crate::maybe_rayon::*;
use rusle_core::raster::{GridSpec, Mask, Raster, RasterElement};
use rusle_core::{Algorithm, CoordTransform, Error, Result, CRS};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::EDGE_DENSIFY_POINTS;

/// Transforms within this distance (in CRS units) count as identical
const ALIGN_TOLERANCE: f64 = 1e-9;

/// Resampling kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resampling {
    /// Value of the source cell containing the target cell centre.
    /// Use for categorical data (masks, class codes).
    Nearest,
    /// Weighted mean of the four surrounding source cell centres.
    /// Use for continuous data (elevation, slope, factors).
    #[default]
    Bilinear,
}

/// Parameters for grid alignment
#[derive(Debug, Clone, Default)]
pub struct AlignParams {
    pub resampling: Resampling,
    /// Cells outside this mask become no-data. Must be laid out on the target grid.
    pub aoi: Option<Mask>,
}

/// Grid aligner
#[derive(Debug, Clone, Default)]
pub struct GridAligner;

impl Algorithm for GridAligner {
    type Input = (Raster<f64>, GridSpec);
    type Output = Raster<f64>;
    type Params = AlignParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Grid Aligner"
    }

    fn description(&self) -> &'static str {
        "Resample a raster onto a canonical grid and apply an AOI mask"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let (src, target) = input;
        align_raster(&src, &target, &params)
    }
}

/// Target → source point transform. A missing CRS on either side is taken
/// to mean "same as the other side".
fn target_to_source(src: Option<&CRS>, dst: Option<&CRS>) -> Result<CoordTransform> {
    match (dst, src) {
        (Some(d), Some(s)) => CoordTransform::new(d, s),
        _ => Ok(CoordTransform::Identity),
    }
}

/// Whether the source extent, carried into the target CRS, intersects the target extent
fn extents_overlap(src: &GridSpec, target: &GridSpec, to_target: &CoordTransform) -> bool {
    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for (x, y) in src.densified_edge(EDGE_DENSIFY_POINTS) {
        let (tx, ty) = to_target.transform(x, y);
        if !(tx.is_finite() && ty.is_finite()) {
            continue;
        }
        min_x = min_x.min(tx);
        min_y = min_y.min(ty);
        max_x = max_x.max(tx);
        max_y = max_y.max(ty);
    }
    let (t_min_x, t_min_y, t_max_x, t_max_y) = target.bounds();
    min_x < t_max_x && max_x > t_min_x && min_y < t_max_y && max_y > t_min_y
}

#[inline]
fn cell_value<T: RasterElement>(src: &Raster<T>, row: f64, col: f64) -> Option<f64> {
    if !(row >= 0.0 && col >= 0.0) {
        return None;
    }
    src.value(row as usize, col as usize).and_then(RasterElement::to_f64)
}

/// Nearest neighbour at fractional pixel position (col, row), corner-based
#[inline]
fn sample_nearest<T: RasterElement>(src: &Raster<T>, col: f64, row: f64) -> Option<f64> {
    cell_value(src, row.floor(), col.floor())
}

/// Bilinear interpolation between cell centres.
///
/// The source cell containing the point must be valid; invalid corners are
/// dropped and the remaining weights renormalised.
fn sample_bilinear<T: RasterElement>(src: &Raster<T>, col: f64, row: f64) -> Option<f64> {
    let centre = sample_nearest(src, col, row)?;

    let x = col - 0.5;
    let y = row - 0.5;
    let c0 = x.floor();
    let r0 = y.floor();
    let tx = x - c0;
    let ty = y - r0;

    let mut sum = 0.0;
    let mut weight = 0.0;
    for (dr, wr) in [(0.0, 1.0 - ty), (1.0, ty)] {
        for (dc, wc) in [(0.0, 1.0 - tx), (1.0, tx)] {
            let w = wr * wc;
            if w <= 0.0 {
                continue;
            }
            if let Some(v) = cell_value(src, r0 + dr, c0 + dc) {
                sum += w * v;
                weight += w;
            }
        }
    }

    if weight > 0.0 {
        Some(sum / weight)
    } else {
        Some(centre)
    }
}

/// Resample `src` onto `target`.
///
/// Target cells whose centre falls outside the source, or on a source
/// no-data cell, become no-data. When `params.aoi` is set, cells outside it
/// are forced to no-data afterwards.
///
/// # Errors
/// `EmptyOutput` when the two grids do not overlap or resampling leaves no
/// valid cell; `UnsupportedCrs` for CRS pairs without a transform.
pub fn align_raster<T: RasterElement>(
    src: &Raster<T>,
    target: &GridSpec,
    params: &AlignParams,
) -> Result<Raster<T>> {
    let src_spec = src.spec();
    let mut output = if src_spec.is_aligned_with(target, ALIGN_TOLERANCE) {
        debug!(rows = target.rows, cols = target.cols, "source already aligned");
        let mut out = src.clone();
        out.set_nodata(num_traits::cast(target.nodata).unwrap_or_else(T::default_nodata));
        out
    } else {
        resample(src, &src_spec, target, params.resampling)?
    };

    if let Some(aoi) = &params.aoi {
        if aoi.count() == 0 {
            warn!("AOI mask contains no cells; output will be empty");
        }
        let dropped = aoi.apply(&mut output)?;
        debug!(dropped, "applied AOI mask");
    }

    Ok(output)
}

fn resample<T: RasterElement>(
    src: &Raster<T>,
    src_spec: &GridSpec,
    target: &GridSpec,
    resampling: Resampling,
) -> Result<Raster<T>> {
    let to_source = target_to_source(src.crs(), target.crs.as_ref())?;
    if !extents_overlap(src_spec, target, &to_source.inverse()) {
        return Err(Error::EmptyOutput(format!(
            "source grid does not overlap target grid {}x{}",
            target.rows, target.cols
        )));
    }

    let src_gt = *src.transform();
    let dst_gt = target.transform;
    let cols = target.cols;

    let sampled: Vec<Vec<Option<T>>> = (0..target.rows)
        .into_par_iter()
        .map(|row| {
            (0..cols)
                .map(|col| {
                    let (x, y) = dst_gt.pixel_to_geo(col, row);
                    let (sx, sy) = to_source.transform(x, y);
                    let (fc, fr) = src_gt.geo_to_pixel(sx, sy);
                    let value = match resampling {
                        Resampling::Nearest => sample_nearest(src, fc, fr),
                        Resampling::Bilinear => sample_bilinear(src, fc, fr),
                    };
                    value.and_then(num_traits::cast::<f64, T>)
                })
                .collect()
        })
        .collect();

    let mut output = Raster::<T>::from_spec(target);
    for (row, values) in sampled.into_iter().enumerate() {
        for (col, value) in values.into_iter().enumerate() {
            if let Some(v) = value {
                output.set(row, col, v)?;
            }
        }
    }

    let valid = output.valid_count();
    if valid == 0 {
        return Err(Error::EmptyOutput(
            "resampling produced no valid cells".to_string(),
        ));
    }
    debug!(
        rows = target.rows,
        cols = target.cols,
        valid,
        ?resampling,
        "resampled raster"
    );
    Ok(output)
}

/// Carry an AOI mask onto `target` with nearest-neighbour resampling.
///
/// Target cells outside the source mask's extent are outside the AOI.
pub fn align_mask(mask: &Mask, target: &GridSpec) -> Result<Mask> {
    let spec = mask.spec();
    if spec.is_aligned_with(target, ALIGN_TOLERANCE) {
        return Mask::on_spec(mask.cells().clone(), target);
    }

    let mut flags = Raster::from_array(mask.cells().map(|&inside| u8::from(inside)));
    flags.set_transform(*mask.transform());
    flags.set_crs(mask.crs().cloned());

    let aligned = resample(&flags, &flags.spec(), target, Resampling::Nearest)?;
    let out = Mask::from_raster(&aligned);
    debug!(cells = out.count(), "aligned AOI mask");
    Ok(out)
}
