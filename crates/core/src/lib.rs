//! # RUSLE Core
//!
//! Core types and I/O for the RUSLE topographic-factor engine.
//!
//! This crate provides:
//! - `Raster<T>`: georeferenced grid with an explicit per-cell validity grid
//! - `GeoTransform` / `GridSpec`: affine georeferencing and target grid specifications
//! - `Mask`: area-of-interest masks aligned to a grid
//! - `Direction` / `FlowDir` / `FlowDirectionGrid`: D8 routing types
//! - `CRS`: coordinate reference systems, UTM zone selection and coordinate transforms
//! - `AoiBoundary`: catchment polygons read from GeoJSON
//! - GeoTIFF I/O

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod vector;

pub use crs::{CoordTransform, CrsKind, CRS};
pub use error::{Error, Result};
pub use raster::{
    Direction, FlowDir, FlowDirectionGrid, GeoTransform, GridSpec, Mask, Raster, RasterElement,
};
pub use vector::AoiBoundary;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::{CoordTransform, CRS};
    pub use crate::error::{Error, Result};
    pub use crate::raster::{
        Direction, FlowDir, FlowDirectionGrid, GeoTransform, GridSpec, Mask, Raster,
        RasterElement,
    };
    pub use crate::Algorithm;
}

/// Core trait for the engine's stages.
///
/// Stages are pure functions that transform an input grid according to parameters.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(
        &self,
        input: Self::Input,
        params: Self::Params,
    ) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(
        &self,
        input: Self::Input,
    ) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
