//! Raster-to-RGBA rendering and PNG previews.

use crate::scheme::{evaluate, ColorScheme, Rgb};
use rusle_core::raster::{Raster, RasterElement};
use rusle_core::{Error, Result};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::debug;

/// Parameters for colormap rendering.
#[derive(Debug, Clone)]
pub struct ColormapParams {
    /// Color scheme to use.
    pub scheme: ColorScheme,
    /// Minimum value for normalization. Values below this are clamped.
    pub min: f64,
    /// Maximum value for normalization. Values above this are clamped.
    pub max: f64,
    /// Color for nodata pixels (RGBA). Default: fully transparent.
    pub nodata_color: [u8; 4],
}

impl ColormapParams {
    /// Create params with explicit min/max range.
    pub fn with_range(scheme: ColorScheme, min: f64, max: f64) -> Self {
        Self {
            scheme,
            min,
            max,
            nodata_color: [0, 0, 0, 0],
        }
    }
}

/// Detect min/max over the valid cells of a raster.
///
/// With `display_cap`, the upper end of the ramp is clipped there so a few
/// extreme cells do not wash out the rest of the image. The data itself is
/// never changed.
pub fn auto_params<T: RasterElement>(
    raster: &Raster<T>,
    scheme: ColorScheme,
    display_cap: Option<f64>,
) -> ColormapParams {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;

    for (_, val) in raster.iter_valid() {
        if let Some(v) = val.to_f64().filter(|v| v.is_finite()) {
            min = min.min(v);
            max = max.max(v);
        }
    }
    if let Some(cap) = display_cap {
        max = max.min(cap);
        min = min.min(cap);
    }

    // all nodata or constant raster
    if !min.is_finite() || !max.is_finite() {
        min = 0.0;
        max = 1.0;
    } else if (max - min).abs() < f64::EPSILON {
        max = min + 1.0;
    }

    ColormapParams::with_range(scheme, min, max)
}

/// Convert a raster to an RGBA pixel buffer.
///
/// Returns a `Vec<u8>` of length `rows * cols * 4` in row-major order.
/// Invalid cells get `params.nodata_color`.
pub fn raster_to_rgba<T: RasterElement>(raster: &Raster<T>, params: &ColormapParams) -> Vec<u8> {
    let (rows, cols) = raster.shape();
    let range = params.max - params.min;
    let inv_range = if range.abs() > f64::EPSILON { 1.0 / range } else { 1.0 };

    let mut rgba = Vec::with_capacity(rows * cols * 4);
    for row in 0..rows {
        for col in 0..cols {
            match raster.value(row, col).and_then(|v| v.to_f64()).filter(|v| v.is_finite()) {
                Some(v) => {
                    let Rgb { r, g, b } = evaluate(params.scheme, (v - params.min) * inv_range);
                    rgba.extend_from_slice(&[r, g, b, 255]);
                }
                None => rgba.extend_from_slice(&params.nodata_color),
            }
        }
    }
    rgba
}

/// Render a raster to an RGBA PNG file
pub fn write_png<T: RasterElement, P: AsRef<Path>>(
    raster: &Raster<T>,
    params: &ColormapParams,
    path: P,
) -> Result<()> {
    let (rows, cols) = raster.shape();
    let too_large = |_| Error::InvalidDimensions {
        width: cols,
        height: rows,
    };
    let width = u32::try_from(cols).map_err(too_large)?;
    let height = u32::try_from(rows).map_err(too_large)?;

    let rgba = raster_to_rgba(raster, params);
    let file = File::create(path.as_ref())?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), width, height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);

    let png_err = |e: png::EncodingError| Error::Other(format!("PNG encoding failed: {e}"));
    let mut writer = encoder.write_header().map_err(png_err)?;
    writer.write_image_data(&rgba).map_err(png_err)?;
    writer.finish().map_err(png_err)?;

    debug!(
        path = %path.as_ref().display(),
        scheme = %params.scheme,
        min = params.min,
        max = params.max,
        "wrote preview"
    );
    Ok(())
}
