//! Statistical summaries of raster data

mod summary;

pub use summary::{summarize, RasterSummary};
