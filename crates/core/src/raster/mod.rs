//! Raster data structures and operations

mod element;
mod flow;
mod geotransform;
mod grid;
mod mask;
mod neighborhood;
mod spec;

pub use element::RasterElement;
pub use flow::FlowDirectionGrid;
pub use geotransform::GeoTransform;
pub use grid::{Raster, RasterStatistics};
pub use mask::Mask;
pub use neighborhood::{Direction, FlowDir};
pub use spec::GridSpec;
