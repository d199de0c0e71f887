//! Run summary

use crate::hydrology::FillReport;
use crate::statistics::RasterSummary;
use crate::terrain::LsCorrections;
use serde::{Deserialize, Serialize};

/// Everything a caller needs to judge whether an LS run is trustworthy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Canonical (input) grid shape as (rows, cols)
    pub canonical_shape: (usize, usize),
    /// CRS slope and routing ran in
    pub metric_crs: String,
    pub metric_shape: (usize, usize),
    /// Cell size in metres used for contributing length
    pub metric_cell_size: f64,
    /// Whether the DEM was reprojected and the LS grid projected back
    pub round_trip: bool,
    /// Input DEM had no CRS and WGS84 was assumed
    pub assumed_crs: bool,
    /// AOI cells on the canonical grid, when an AOI was given
    pub aoi_cells: Option<usize>,
    pub fill: FillReport,
    /// Valid cells with a defined flow direction
    pub defined_directions: usize,
    pub max_accumulation: f64,
    pub ls_corrections: LsCorrections,
    /// Negative values clamped after projecting LS back to the canonical grid
    pub back_projection_clamped: usize,
    /// LS distribution on the canonical grid; `None` if no cell is valid
    pub summary: Option<RasterSummary>,
    pub display_cap: f64,
    /// Cells whose LS exceeds the display cap
    pub above_display_cap: usize,
}

impl PipelineReport {
    /// Total corrections applied to LS values
    pub fn total_corrections(&self) -> usize {
        self.ls_corrections.negative_clamped
            + self.ls_corrections.non_finite
            + self.back_projection_clamped
    }
}
