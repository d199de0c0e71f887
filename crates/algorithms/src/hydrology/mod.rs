//! Hydrological conditioning and routing
//!
//! - Depression filling: bounded neighbour-mean pit removal, or Priority-Flood
//! - Flow direction: D8 steepest descent with a fixed tie-break order
//! - Flow accumulation: upstream contributing cells via topological drain order

mod depression;
mod flow_accumulation;
mod flow_direction;
mod priority_flood;

pub use depression::{
    count_pits, fill_depressions, DepressionFill, DepressionMethod, FillParams, FillReport,
};
pub use flow_accumulation::{flow_accumulation, FlowAccumulation};
pub use flow_direction::{
    flow_direction, resolve_direction, EdgePolicy, FlowDirection, FlowDirectionParams,
};
pub use priority_flood::priority_flood;
