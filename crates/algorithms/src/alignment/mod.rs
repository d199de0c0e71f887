//! Grid alignment
//!
//! Resampling rasters and AOI masks onto a canonical grid, and building the
//! metric (UTM) working grid used by slope and LS computation.

mod metric;
mod resample;

pub use metric::{metric_grid_for, MetricGrid, EDGE_DENSIFY_POINTS};
pub use resample::{align_mask, align_raster, AlignParams, GridAligner, Resampling};
