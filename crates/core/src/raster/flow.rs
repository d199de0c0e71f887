//! Per-cell D8 flow directions

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{Direction, FlowDir, GeoTransform, Raster};
use ndarray::Array2;

/// Sentinel used for no-data cells when directions are written as codes
pub const FLOW_DIR_NODATA: u8 = 255;

/// A grid of [`FlowDir`] values with the validity of the elevation it was
/// derived from.
///
/// Validity and direction are separate questions: a valid cell may still
/// have an undefined direction (flat or unresolved pit) and then acts as a
/// terminal sink during accumulation.
#[derive(Debug, Clone)]
pub struct FlowDirectionGrid {
    dirs: Array2<FlowDir>,
    valid: Array2<bool>,
    transform: GeoTransform,
    crs: Option<CRS>,
}

impl FlowDirectionGrid {
    /// All cells valid and undefined
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            dirs: Array2::from_elem((rows, cols), FlowDir::Undefined),
            valid: Array2::from_elem((rows, cols), true),
            transform: GeoTransform::default(),
            crs: None,
        }
    }

    /// Build from direction and validity arrays of the same shape
    pub fn from_parts(dirs: Array2<FlowDir>, valid: Array2<bool>) -> Result<Self> {
        if dirs.dim() != valid.dim() {
            let (er, ec) = dirs.dim();
            let (ar, ac) = valid.dim();
            return Err(Error::SizeMismatch { er, ec, ar, ac });
        }
        Ok(Self {
            dirs,
            valid,
            transform: GeoTransform::default(),
            crs: None,
        })
    }

    /// Copy georeferencing from another raster
    pub fn with_meta_of<T: crate::raster::RasterElement>(mut self, raster: &Raster<T>) -> Self {
        self.transform = *raster.transform();
        self.crs = raster.crs().cloned();
        self
    }

    pub fn rows(&self) -> usize {
        self.dirs.nrows()
    }

    pub fn cols(&self) -> usize {
        self.dirs.ncols()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.dirs.dim()
    }

    /// Direction at (row, col); `Undefined` outside the grid
    #[inline]
    pub fn dir(&self, row: usize, col: usize) -> FlowDir {
        self.dirs.get((row, col)).copied().unwrap_or_default()
    }

    #[inline]
    pub fn is_valid(&self, row: usize, col: usize) -> bool {
        matches!(self.valid.get((row, col)), Some(true))
    }

    /// Set the direction of a cell and mark it valid
    pub fn set(&mut self, row: usize, col: usize, dir: FlowDir) -> Result<()> {
        let (rows, cols) = self.shape();
        if row >= rows || col >= cols {
            return Err(Error::IndexOutOfBounds { row, col, rows, cols });
        }
        self.dirs[(row, col)] = dir;
        self.valid[(row, col)] = true;
        Ok(())
    }

    /// Mark a cell as no-data
    pub fn set_invalid(&mut self, row: usize, col: usize) -> Result<()> {
        let (rows, cols) = self.shape();
        if row >= rows || col >= cols {
            return Err(Error::IndexOutOfBounds { row, col, rows, cols });
        }
        self.dirs[(row, col)] = FlowDir::Undefined;
        self.valid[(row, col)] = false;
        Ok(())
    }

    /// Downstream cell of (row, col), if the direction is defined and stays on the grid
    #[inline]
    pub fn target(&self, row: usize, col: usize) -> Option<(usize, usize)> {
        let (rows, cols) = self.shape();
        self.dir(row, col)
            .direction()
            .and_then(|d: Direction| d.step(row, col, rows, cols))
    }

    pub fn directions(&self) -> &Array2<FlowDir> {
        &self.dirs
    }

    pub fn validity(&self) -> &Array2<bool> {
        &self.valid
    }

    pub fn valid_count(&self) -> usize {
        self.valid.iter().filter(|&&v| v).count()
    }

    pub fn defined_count(&self) -> usize {
        self.dirs
            .iter()
            .zip(self.valid.iter())
            .filter(|(d, &ok)| ok && d.is_defined())
            .count()
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    /// Encode as a `u8` raster (0 undefined, 1..=8 directions, 255 no-data)
    pub fn to_codes(&self) -> Raster<u8> {
        let codes = self.dirs.map(|d| d.code());
        let mut raster = Raster::from_parts(codes, self.valid.clone())
            .unwrap_or_else(|_| Raster::empty(self.rows(), self.cols()));
        raster.set_transform(self.transform);
        raster.set_crs(self.crs.clone());
        raster.set_nodata(FLOW_DIR_NODATA);
        raster
    }

    /// Decode a `u8` code raster; codes outside 0..=8 on valid cells are rejected
    pub fn from_codes(codes: &Raster<u8>) -> Result<Self> {
        let (rows, cols) = codes.shape();
        let mut dirs = Array2::from_elem((rows, cols), FlowDir::Undefined);
        for ((row, col), code) in codes.iter_valid() {
            dirs[(row, col)] = FlowDir::from_code(code).ok_or_else(|| Error::InvalidParameter {
                name: "flow_direction_code",
                value: code.to_string(),
                reason: format!("cell ({row}, {col}) is not a D8 code 0..=8"),
            })?;
        }
        let mut grid = Self::from_parts(dirs, codes.validity().clone())?;
        grid.transform = *codes.transform();
        grid.crs = codes.crs().cloned();
        Ok(grid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_follows_direction() {
        let mut grid = FlowDirectionGrid::new(3, 3);
        grid.set(1, 1, Direction::SouthEast.into()).unwrap();
        grid.set(0, 0, Direction::North.into()).unwrap();
        assert_eq!(grid.target(1, 1), Some((2, 2)));
        assert_eq!(grid.target(0, 0), None);
        assert_eq!(grid.target(2, 2), None);
        assert_eq!(grid.defined_count(), 2);
    }

    #[test]
    fn test_codes_roundtrip() {
        let mut grid = FlowDirectionGrid::new(2, 2);
        grid.set(0, 0, Direction::East.into()).unwrap();
        grid.set(0, 1, Direction::South.into()).unwrap();
        grid.set_invalid(1, 0).unwrap();

        let codes = grid.to_codes();
        assert_eq!(codes.value(0, 0), Some(1));
        assert_eq!(codes.value(0, 1), Some(7));
        assert_eq!(codes.value(1, 0), None);
        assert_eq!(codes.value(1, 1), Some(0));

        let back = FlowDirectionGrid::from_codes(&codes).unwrap();
        assert_eq!(back.dir(0, 1), FlowDir::Toward(Direction::South));
        assert!(!back.is_valid(1, 0));
    }

    #[test]
    fn test_from_codes_rejects_garbage() {
        let codes = Raster::<u8>::filled(1, 1, 42);
        assert!(FlowDirectionGrid::from_codes(&codes).is_err());
    }
}
