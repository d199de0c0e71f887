//! Error types for the RUSLE engine

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for raster and terrain-routing operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("input not found: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("CRS mismatch: {0} vs {1}")]
    CrsMismatch(String, String),

    #[error("Unsupported CRS transformation: {from} -> {to}")]
    UnsupportedCrs { from: String, to: String },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("empty output: {0}")]
    EmptyOutput(String),

    #[error("degenerate transform: {0}")]
    DegenerateTransform(String),

    #[error("flow graph contains a cycle: {unresolved} valid cells never drained")]
    FlowCycle { unresolved: usize },

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error aborts a pipeline run because the data itself is
    /// inconsistent, as opposed to a usage or I/O problem.
    pub fn is_consistency_error(&self) -> bool {
        matches!(self, Error::FlowCycle { .. } | Error::DegenerateTransform(_))
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;
