//! Target grid specification

use crate::crs::CRS;
use crate::raster::GeoTransform;
use serde::{Deserialize, Serialize};

/// Everything needed to lay out a raster: CRS, transform, shape and the
/// no-data sentinel written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub crs: Option<CRS>,
    pub transform: GeoTransform,
    pub rows: usize,
    pub cols: usize,
    pub nodata: f64,
}

impl GridSpec {
    pub fn new(
        crs: Option<CRS>,
        transform: GeoTransform,
        rows: usize,
        cols: usize,
        nodata: f64,
    ) -> Self {
        Self {
            crs,
            transform,
            rows,
            cols,
            nodata,
        }
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Bounds (min_x, min_y, max_x, max_y) in the grid's own CRS
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols, self.rows)
    }

    /// Geographic coordinates of the grid centre
    pub fn centroid(&self) -> (f64, f64) {
        self.transform
            .fractional_to_geo(self.cols as f64 / 2.0, self.rows as f64 / 2.0)
    }

    /// Points along the outer edge of the grid, `per_edge` samples per side.
    ///
    /// Used to carry the extent through non-linear projections, where
    /// transforming the four corners alone under-estimates the envelope.
    pub fn densified_edge(&self, per_edge: usize) -> Vec<(f64, f64)> {
        let n = per_edge.max(2);
        let w = self.cols as f64;
        let h = self.rows as f64;
        let mut pts = Vec::with_capacity(4 * n);
        for i in 0..n {
            let t = i as f64 / (n - 1) as f64;
            pts.push(self.transform.fractional_to_geo(t * w, 0.0));
            pts.push(self.transform.fractional_to_geo(t * w, h));
            pts.push(self.transform.fractional_to_geo(0.0, t * h));
            pts.push(self.transform.fractional_to_geo(w, t * h));
        }
        pts
    }

    /// Same CRS, transform (within `tol`) and shape
    pub fn is_aligned_with(&self, other: &GridSpec, tol: f64) -> bool {
        let same_crs = match (&self.crs, &other.crs) {
            (Some(a), Some(b)) => a.is_equivalent(b),
            (None, None) => true,
            _ => false,
        };
        same_crs
            && self.rows == other.rows
            && self.cols == other.cols
            && self.transform.approx_eq(&other.transform, tol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centroid_of_simple_grid() {
        let spec = GridSpec::new(None, GeoTransform::new(0.0, 10.0, 1.0, -1.0), 10, 20, -9999.0);
        assert_eq!(spec.centroid(), (10.0, 5.0));
    }

    #[test]
    fn densified_edge_covers_corners() {
        let spec = GridSpec::new(None, GeoTransform::new(0.0, 10.0, 1.0, -1.0), 10, 10, -9999.0);
        let pts = spec.densified_edge(21);
        assert_eq!(pts.len(), 84);
        assert!(pts.contains(&(0.0, 10.0)));
        assert!(pts.contains(&(10.0, 0.0)));
    }

    #[test]
    fn alignment_requires_matching_crs() {
        let gt = GeoTransform::new(0.0, 10.0, 1.0, -1.0);
        let a = GridSpec::new(Some(CRS::wgs84()), gt, 4, 4, -9999.0);
        let b = GridSpec::new(Some(CRS::from_epsg(32643)), gt, 4, 4, -9999.0);
        assert!(a.is_aligned_with(&a.clone(), 1e-9));
        assert!(!a.is_aligned_with(&b, 1e-9));
    }
}
