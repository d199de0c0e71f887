//! Terrain analysis
//!
//! - Slope: Horn finite differences on a metric DEM
//! - LS-factor: RUSLE topographic factor from accumulation and slope

mod ls_factor;
mod slope;

pub use ls_factor::{clamp_negative, ls_factor, LsCorrections, LsFactor, LsParams, UNIT_PLOT_LENGTH};
pub use slope::{slope, Slope, SlopeParams, SlopeUnits};
