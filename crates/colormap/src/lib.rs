//! # RUSLE Colormap
//!
//! Colour ramps and raster-to-RGBA rendering for previews of RUSLE factor
//! rasters. The LS preview uses the YlOrRd ramp clipped at a display cap;
//! the cap only affects colours, never the data.
//!
//! ## Usage
//!
//! ```ignore
//! use rusle_colormap::{auto_params, write_png, ColorScheme};
//!
//! let params = auto_params(&ls, ColorScheme::YlOrRd, Some(50.0));
//! write_png(&ls, &params, "ls_factor_map.png")?;
//! ```

mod render;
mod scheme;

pub use render::{auto_params, raster_to_rgba, write_png, ColormapParams};
pub use scheme::{evaluate, ColorScheme, ColorStop, Rgb};
