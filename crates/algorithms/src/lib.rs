//! # RUSLE Algorithms
//!
//! Stages of the RUSLE LS-factor engine and the pipeline that sequences them.
//!
//! ## Modules
//!
//! - **alignment**: resampling onto a canonical grid, AOI masking, metric (UTM) grid selection
//! - **hydrology**: depression filling, D8 flow direction, flow accumulation
//! - **terrain**: slope, LS-factor
//! - **statistics**: summary statistics of valid cells
//! - **pipeline**: the end-to-end LS run and its configuration

pub mod alignment;
pub mod hydrology;
pub(crate) mod maybe_rayon;
pub mod pipeline;
pub mod statistics;
pub mod terrain;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::alignment::{
        align_mask, align_raster, metric_grid_for, AlignParams, GridAligner, MetricGrid, Resampling,
    };
    pub use crate::hydrology::{
        fill_depressions, flow_accumulation, flow_direction, DepressionFill, DepressionMethod,
        EdgePolicy, FillParams, FillReport, FlowAccumulation, FlowDirection, FlowDirectionParams,
    };
    pub use crate::pipeline::{read_aoi, run, run_files, LsConfig, LsOutput, PipelineReport};
    pub use crate::statistics::{summarize, RasterSummary};
    pub use crate::terrain::{
        ls_factor, slope, LsCorrections, LsFactor, LsParams, Slope, SlopeParams, SlopeUnits,
    };
    pub use rusle_core::prelude::*;
}
