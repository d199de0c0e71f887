//! Area-of-interest masks

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, GridSpec, Raster, RasterElement};
use geo::{Contains, MultiPolygon, Point};
use ndarray::Array2;

/// Boolean in/out grid aligned to a raster.
#[derive(Debug, Clone)]
pub struct Mask {
    cells: Array2<bool>,
    transform: GeoTransform,
    crs: Option<CRS>,
}

impl Mask {
    pub fn from_array(cells: Array2<bool>) -> Self {
        Self {
            cells,
            transform: GeoTransform::default(),
            crs: None,
        }
    }

    /// Build a mask laid out on `spec` from an in/out array
    pub fn on_spec(cells: Array2<bool>, spec: &GridSpec) -> Result<Self> {
        if cells.dim() != spec.shape() {
            let (ar, ac) = cells.dim();
            return Err(Error::SizeMismatch {
                er: spec.rows,
                ec: spec.cols,
                ar,
                ac,
            });
        }
        Ok(Self {
            cells,
            transform: spec.transform,
            crs: spec.crs.clone(),
        })
    }

    /// Cells that are valid and strictly positive are inside the AOI
    pub fn from_raster<T: RasterElement>(raster: &Raster<T>) -> Self {
        let (rows, cols) = raster.shape();
        let mut cells = Array2::from_elem((rows, cols), false);
        for ((row, col), v) in raster.iter_valid() {
            cells[(row, col)] = v > T::zero();
        }
        Self {
            cells,
            transform: *raster.transform(),
            crs: raster.crs().cloned(),
        }
    }

    /// Rasterize polygons onto `spec`: a cell is inside when its centre is
    /// inside the polygon (boundary-touching cells are not added).
    ///
    /// Polygon coordinates must be in the CRS of `spec`.
    pub fn rasterize(polygons: &MultiPolygon<f64>, spec: &GridSpec) -> Self {
        let mut cells = Array2::from_elem(spec.shape(), false);
        for ((row, col), inside) in cells.indexed_iter_mut() {
            let (x, y) = spec.transform.pixel_to_geo(col, row);
            *inside = polygons.contains(&Point::new(x, y));
        }
        Self {
            cells,
            transform: spec.transform,
            crs: spec.crs.clone(),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.cells.dim()
    }

    pub fn rows(&self) -> usize {
        self.cells.nrows()
    }

    pub fn cols(&self) -> usize {
        self.cells.ncols()
    }

    /// Whether (row, col) is inside the AOI; false outside the grid
    #[inline]
    pub fn contains(&self, row: usize, col: usize) -> bool {
        matches!(self.cells.get((row, col)), Some(true))
    }

    /// Number of cells inside the AOI
    pub fn count(&self) -> usize {
        self.cells.iter().filter(|&&v| v).count()
    }

    pub fn cells(&self) -> &Array2<bool> {
        &self.cells
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    /// The grid specification this mask lives on
    pub fn spec(&self) -> GridSpec {
        GridSpec::new(self.crs.clone(), self.transform, self.rows(), self.cols(), 0.0)
    }

    /// Invalidate every raster cell outside the mask.
    ///
    /// The mask must have the raster's shape; returns the number of cells
    /// that were valid and got dropped.
    pub fn apply<T: RasterElement>(&self, raster: &mut Raster<T>) -> Result<usize> {
        if raster.shape() != self.shape() {
            let (er, ec) = raster.shape();
            let (ar, ac) = self.shape();
            return Err(Error::SizeMismatch { er, ec, ar, ac });
        }
        let mut dropped = 0usize;
        raster.retain_valid(|row, col, _| {
            let keep = self.cells[(row, col)];
            if !keep {
                dropped += 1;
            }
            keep
        });
        Ok(dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon};

    #[test]
    fn from_raster_uses_positive_valid_cells() {
        let mut r = Raster::<u8>::from_vec(vec![0, 1, 2, 1], 2, 2).unwrap();
        r.set_invalid(1, 1).unwrap();
        let mask = Mask::from_raster(&r);
        assert!(!mask.contains(0, 0));
        assert!(mask.contains(0, 1));
        assert!(mask.contains(1, 0));
        assert!(!mask.contains(1, 1));
        assert_eq!(mask.count(), 2);
    }

    #[test]
    fn rasterize_by_cell_centre() {
        // 4x4 grid of unit cells, polygon covering the left half
        let spec = GridSpec::new(None, GeoTransform::new(0.0, 4.0, 1.0, -1.0), 4, 4, -9999.0);
        let poly = polygon![(x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 4.0), (x: 0.0, y: 4.0)];
        let mask = Mask::rasterize(&MultiPolygon::new(vec![poly]), &spec);
        assert_eq!(mask.count(), 8);
        assert!(mask.contains(0, 0));
        assert!(mask.contains(3, 1));
        assert!(!mask.contains(0, 2));
    }

    #[test]
    fn apply_drops_outside_cells() {
        let mut r = Raster::<f64>::filled(2, 2, 5.0);
        let mask = Mask::from_array(ndarray::arr2(&[[true, false], [true, true]]));
        let dropped = mask.apply(&mut r).unwrap();
        assert_eq!(dropped, 1);
        assert_eq!(r.value(0, 1), None);
        assert_eq!(r.valid_count(), 3);
    }

    #[test]
    fn apply_rejects_shape_mismatch() {
        let mut r = Raster::<f64>::filled(2, 3, 5.0);
        let mask = Mask::from_array(Array2::from_elem((2, 2), true));
        assert!(mask.apply(&mut r).is_err());
    }
}
