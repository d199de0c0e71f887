//! D8 neighbourhood: the eight compass directions around a cell
//!
//! File encoding:
//! ```text
//!   4  3  2
//!   5  0  1
//!   6  7  8
//! ```
//! 0 = undefined (flat, pit, border or no-data).

use serde::{Deserialize, Serialize};

/// One of the eight D8 neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    East,
    NorthEast,
    North,
    NorthWest,
    West,
    SouthWest,
    South,
    SouthEast,
}

impl Direction {
    /// All directions in file-encoding order (codes 1..=8)
    pub const ALL: [Direction; 8] = [
        Direction::East,
        Direction::NorthEast,
        Direction::North,
        Direction::NorthWest,
        Direction::West,
        Direction::SouthWest,
        Direction::South,
        Direction::SouthEast,
    ];

    /// Tie-break order for steepest descent: row-major over the 3x3 window.
    /// When several neighbours share the maximal drop the first one here wins.
    pub const PRIORITY: [Direction; 8] = [
        Direction::NorthWest,
        Direction::North,
        Direction::NorthEast,
        Direction::West,
        Direction::East,
        Direction::SouthWest,
        Direction::South,
        Direction::SouthEast,
    ];

    /// (row_offset, col_offset); north is row - 1
    pub const fn offset(self) -> (isize, isize) {
        match self {
            Direction::East => (0, 1),
            Direction::NorthEast => (-1, 1),
            Direction::North => (-1, 0),
            Direction::NorthWest => (-1, -1),
            Direction::West => (0, -1),
            Direction::SouthWest => (1, -1),
            Direction::South => (1, 0),
            Direction::SouthEast => (1, 1),
        }
    }

    /// File code 1..=8
    pub const fn code(self) -> u8 {
        match self {
            Direction::East => 1,
            Direction::NorthEast => 2,
            Direction::North => 3,
            Direction::NorthWest => 4,
            Direction::West => 5,
            Direction::SouthWest => 6,
            Direction::South => 7,
            Direction::SouthEast => 8,
        }
    }

    pub fn from_code(code: u8) -> Option<Direction> {
        match code {
            1..=8 => Some(Self::ALL[(code - 1) as usize]),
            _ => None,
        }
    }

    pub fn from_offset(dr: isize, dc: isize) -> Option<Direction> {
        Self::ALL.into_iter().find(|d| d.offset() == (dr, dc))
    }

    /// The direction pointing back at this cell from the neighbour
    pub fn opposite(self) -> Direction {
        let (dr, dc) = self.offset();
        // every offset has a mirrored counterpart in ALL
        Self::from_offset(-dr, -dc).unwrap_or(self)
    }

    /// Neighbour coordinates, or `None` if they fall outside a rows x cols grid
    #[inline]
    pub fn step(self, row: usize, col: usize, rows: usize, cols: usize) -> Option<(usize, usize)> {
        let (dr, dc) = self.offset();
        let nr = row.checked_add_signed(dr)?;
        let nc = col.checked_add_signed(dc)?;
        (nr < rows && nc < cols).then_some((nr, nc))
    }
}

/// Flow direction of a single cell: toward one neighbour, or undefined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FlowDir {
    /// Flat, unresolved pit, grid border or no-data
    #[default]
    Undefined,
    Toward(Direction),
}

impl FlowDir {
    pub fn is_defined(self) -> bool {
        matches!(self, FlowDir::Toward(_))
    }

    pub fn direction(self) -> Option<Direction> {
        match self {
            FlowDir::Toward(d) => Some(d),
            FlowDir::Undefined => None,
        }
    }

    /// File code: 0 for undefined, 1..=8 otherwise
    pub fn code(self) -> u8 {
        self.direction().map_or(0, Direction::code)
    }

    /// Decode a file code; `None` for codes outside 0..=8
    pub fn from_code(code: u8) -> Option<FlowDir> {
        match code {
            0 => Some(FlowDir::Undefined),
            c => Direction::from_code(c).map(FlowDir::Toward),
        }
    }
}

impl From<Direction> for FlowDir {
    fn from(d: Direction) -> Self {
        FlowDir::Toward(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_roundtrip() {
        for d in Direction::ALL {
            assert_eq!(Direction::from_code(d.code()), Some(d));
            assert_eq!(FlowDir::from_code(d.code()), Some(FlowDir::Toward(d)));
        }
        assert_eq!(FlowDir::from_code(0), Some(FlowDir::Undefined));
        assert_eq!(FlowDir::from_code(9), None);
    }

    #[test]
    fn test_opposite() {
        assert_eq!(Direction::East.opposite(), Direction::West);
        assert_eq!(Direction::North.opposite(), Direction::South);
        assert_eq!(Direction::NorthEast.opposite(), Direction::SouthWest);
    }

    #[test]
    fn test_priority_is_row_major() {
        let offsets: Vec<_> = Direction::PRIORITY.iter().map(|d| d.offset()).collect();
        let mut sorted = offsets.clone();
        sorted.sort();
        assert_eq!(offsets, sorted);
    }

    #[test]
    fn test_step_respects_bounds() {
        assert_eq!(Direction::NorthWest.step(0, 0, 3, 3), None);
        assert_eq!(Direction::SouthEast.step(2, 2, 3, 3), None);
        assert_eq!(Direction::SouthEast.step(1, 1, 3, 3), Some((2, 2)));
    }
}
