//! Priority-Flood depression filling
//!
//! Processes cells in elevation order from the edge of the data inward with
//! a min-heap, so every valid cell ends up with a non-ascending path to the
//! edge. Cells are visited once: O(n log n).
//!
//! Reference:
//! Barnes, R., Lehman, C., & Mulla, D. (2014). Priority-Flood: An optimal
//! depression-filling and watershed-labeling algorithm for digital elevation
//! models. *Computers & Geosciences*, 62, 117–127.

use ndarray::Array2;
use rusle_core::raster::{Direction, Raster};
use rusle_core::Result;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A cell in the priority queue, ordered by elevation (min-heap via reversed Ord).
#[derive(Debug, Clone)]
struct Cell {
    elevation: f64,
    row: usize,
    col: usize,
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Cell {}

impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cell {
    fn cmp(&self, other: &Self) -> Ordering {
        // Lower elevation first; ties broken by position for a stable order
        other
            .elevation
            .total_cmp(&self.elevation)
            .then_with(|| (other.row, other.col).cmp(&(self.row, self.col)))
    }
}

/// Whether a valid cell touches the grid edge or a no-data cell
fn is_edge_of_data(dem: &Raster<f64>, row: usize, col: usize) -> bool {
    dem.is_border(row, col)
        || Direction::ALL.iter().any(|d| {
            let (dr, dc) = d.offset();
            dem.value_at_offset(row, col, dr, dc).is_none()
        })
}

/// Fill every depression in `dem`.
///
/// Flats inside filled depressions rise by `epsilon` per step away from the
/// spill point so they keep a drainage gradient; `epsilon = 0` leaves them
/// perfectly flat. Returns the filled surface and the number of cells raised.
pub fn priority_flood(dem: &Raster<f64>, epsilon: f64) -> Result<(Raster<f64>, usize)> {
    let (rows, cols) = dem.shape();
    let mut output = dem.clone();
    let mut visited = Array2::<bool>::from_elem((rows, cols), false);
    let mut heap = BinaryHeap::new();

    // Seed with the edge of the data
    for ((row, col), z) in dem.iter_valid() {
        if is_edge_of_data(dem, row, col) {
            heap.push(Cell {
                elevation: z,
                row,
                col,
            });
            visited[(row, col)] = true;
        }
    }

    let mut raised = 0usize;
    while let Some(cell) = heap.pop() {
        for dir in Direction::ALL {
            let Some((nr, nc)) = dir.step(cell.row, cell.col, rows, cols) else {
                continue;
            };
            if visited[(nr, nc)] {
                continue;
            }
            visited[(nr, nc)] = true;

            let Some(neighbor_elev) = dem.value(nr, nc) else {
                continue;
            };

            let floor = cell.elevation + epsilon;
            let filled_elev = if neighbor_elev < floor {
                raised += 1;
                floor
            } else {
                neighbor_elev
            };

            output.set(nr, nc, filled_elev)?;
            heap.push(Cell {
                elevation: filled_elev,
                row: nr,
                col: nc,
            });
        }
    }

    Ok((output, raised))
}
