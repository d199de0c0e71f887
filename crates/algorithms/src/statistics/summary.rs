//! Summary statistics over the valid cells of a raster
//!
//! Percentiles interpolate linearly between the two nearest ranks, so the
//! median of an even-sized sample is the mean of its two middle values.

use rusle_core::raster::Raster;
use serde::{Deserialize, Serialize};

/// Distribution of the valid values of a raster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterSummary {
    pub count: usize,
    pub min: f64,
    pub p05: f64,
    pub p25: f64,
    pub median: f64,
    pub p75: f64,
    pub p95: f64,
    pub max: f64,
    pub mean: f64,
    /// Sample standard deviation (n - 1); 0 for a single value
    pub std_dev: f64,
}

/// Percentile `p` (0-100) of an ascending, non-empty slice
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let rank = (p / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Summarise the finite valid values of `raster`; `None` when there are none
pub fn summarize(raster: &Raster<f64>) -> Option<RasterSummary> {
    let mut vals: Vec<f64> = raster
        .iter_valid()
        .map(|(_, v)| v)
        .filter(|v| v.is_finite())
        .collect();
    if vals.is_empty() {
        return None;
    }
    vals.sort_by(f64::total_cmp);

    let count = vals.len();
    let mean = vals.iter().sum::<f64>() / count as f64;
    let std_dev = if count > 1 {
        let ss: f64 = vals.iter().map(|v| (v - mean) * (v - mean)).sum();
        (ss / (count - 1) as f64).sqrt()
    } else {
        0.0
    };

    Some(RasterSummary {
        count,
        min: vals[0],
        p05: percentile(&vals, 5.0),
        p25: percentile(&vals, 25.0),
        median: percentile(&vals, 50.0),
        p75: percentile(&vals, 75.0),
        p95: percentile(&vals, 95.0),
        max: vals[count - 1],
        mean,
        std_dev,
    })
}
