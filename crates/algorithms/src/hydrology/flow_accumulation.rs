//! Flow accumulation
//!
//! Counts, for every valid cell, the cells (itself included) whose D8 flow
//! path passes through it.
//!
//! The flow graph is processed in drain order with Kahn's algorithm:
//! 1. Count incoming flows for each cell (in-degree)
//! 2. Seed a FIFO queue with every valid cell of in-degree 0
//! 3. Pop a cell, add its count to its downstream cell, decrement that
//!    cell's in-degree and enqueue it once it reaches 0
//!
//! Undefined cells, and cells draining off the grid or into no-data, are
//! terminal: they receive but pass nothing on. Every valid cell is popped
//! exactly once; cells that are never popped sit on a cycle.

use ndarray::Array2;
use rusle_core::raster::{FlowDirectionGrid, Raster};
use rusle_core::{Algorithm, Error, Result};
use std::collections::VecDeque;
use tracing::{debug, error};

/// Flow accumulation algorithm
#[derive(Debug, Clone, Default)]
pub struct FlowAccumulation;

impl Algorithm for FlowAccumulation {
    type Input = FlowDirectionGrid;
    type Output = Raster<f64>;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "Flow Accumulation"
    }

    fn description(&self) -> &'static str {
        "Count upstream contributing cells from D8 flow direction"
    }

    fn execute(&self, input: Self::Input, _params: Self::Params) -> Result<Self::Output> {
        flow_accumulation(&input)
    }
}

/// Downstream cell that takes part in accumulation
#[inline]
fn downstream(dirs: &FlowDirectionGrid, row: usize, col: usize) -> Option<(usize, usize)> {
    dirs.target(row, col)
        .filter(|&(tr, tc)| dirs.is_valid(tr, tc))
}

/// Compute flow accumulation from a D8 flow direction grid.
///
/// Every valid cell starts at 1. The result carries the direction grid's
/// validity and georeferencing.
///
/// # Errors
/// [`Error::FlowCycle`] when some valid cells can never be drained, which
/// only happens if the direction grid contains a cycle.
pub fn flow_accumulation(dirs: &FlowDirectionGrid) -> Result<Raster<f64>> {
    let (rows, cols) = dirs.shape();

    // Step 1: in-degree
    let mut in_degree = Array2::<u8>::zeros((rows, cols));
    for row in 0..rows {
        for col in 0..cols {
            if !dirs.is_valid(row, col) {
                continue;
            }
            if let Some(target) = downstream(dirs, row, col) {
                in_degree[target] += 1;
            }
        }
    }

    // Step 2: headwaters
    let mut accumulation = Array2::<f64>::zeros((rows, cols));
    let mut queue = VecDeque::new();
    for ((row, col), &valid) in dirs.validity().indexed_iter() {
        if !valid {
            continue;
        }
        accumulation[(row, col)] = 1.0;
        if in_degree[(row, col)] == 0 {
            queue.push_back((row, col));
        }
    }

    // Step 3: drain order
    let mut processed = 0usize;
    while let Some((row, col)) = queue.pop_front() {
        processed += 1;
        let Some(target) = downstream(dirs, row, col) else {
            continue;
        };
        accumulation[target] += accumulation[(row, col)];
        in_degree[target] -= 1;
        if in_degree[target] == 0 {
            queue.push_back(target);
        }
    }

    let valid = dirs.valid_count();
    if processed != valid {
        let unresolved = valid - processed;
        error!(unresolved, "flow graph has a cycle");
        return Err(Error::FlowCycle { unresolved });
    }

    let mut output = Raster::from_parts(accumulation, dirs.validity().clone())?;
    output.set_transform(*dirs.transform());
    output.set_crs(dirs.crs().cloned());

    debug!(
        cells = processed,
        max = output.statistics().max.unwrap_or(0.0),
        "accumulated flow"
    );
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusle_core::raster::{Direction, FlowDir};

    #[test]
    fn chain_accumulates_downstream() {
        // 1x4 row draining east
        let mut dirs = FlowDirectionGrid::new(1, 4);
        for col in 0..3 {
            dirs.set(0, col, Direction::East.into()).unwrap();
        }
        let acc = flow_accumulation(&dirs).unwrap();
        assert_eq!(acc.value(0, 0), Some(1.0));
        assert_eq!(acc.value(0, 1), Some(2.0));
        assert_eq!(acc.value(0, 3), Some(4.0));
    }

    #[test]
    fn confluence_sums_branches() {
        //  ↘ ↓ ↙
        //  → x ←
        //  ↗ ↑ ↖
        let mut dirs = FlowDirectionGrid::new(3, 3);
        for dir in Direction::ALL {
            let (dr, dc) = dir.opposite().offset();
            let row = (1 + dr) as usize;
            let col = (1 + dc) as usize;
            dirs.set(row, col, dir.into()).unwrap();
        }
        let acc = flow_accumulation(&dirs).unwrap();
        assert_eq!(acc.value(1, 1), Some(9.0));
        assert_eq!(acc.value(0, 0), Some(1.0));
    }

    #[test]
    fn nodata_stays_nodata_and_is_terminal() {
        let mut dirs = FlowDirectionGrid::new(1, 3);
        dirs.set(0, 0, Direction::East.into()).unwrap();
        dirs.set(0, 1, Direction::East.into()).unwrap();
        dirs.set_invalid(0, 2).unwrap();
        let acc = flow_accumulation(&dirs).unwrap();
        assert_eq!(acc.value(0, 1), Some(2.0));
        assert_eq!(acc.value(0, 2), None);
    }

    #[test]
    fn mutual_pointers_are_a_cycle() {
        let mut dirs = FlowDirectionGrid::new(2, 2);
        dirs.set(0, 0, Direction::East.into()).unwrap();
        dirs.set(0, 1, Direction::West.into()).unwrap();
        dirs.set(1, 0, FlowDir::Undefined).unwrap();
        let err = flow_accumulation(&dirs).unwrap_err();
        assert!(matches!(err, Error::FlowCycle { unresolved: 2 }));
    }

    #[test]
    fn algorithm_trait_matches_free_function() {
        let mut dirs = FlowDirectionGrid::new(1, 3);
        dirs.set(0, 0, FlowDir::Toward(Direction::East)).unwrap();
        dirs.set(0, 1, FlowDir::Toward(Direction::East)).unwrap();
        let acc = FlowAccumulation.execute_default(dirs).unwrap();
        assert_eq!(FlowAccumulation.name(), "Flow Accumulation");
        assert_eq!(acc.value(0, 2), Some(3.0));
    }
}
