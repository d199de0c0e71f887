//! Affine georeferencing for rasters

use serde::{Deserialize, Serialize};

/// Six-coefficient affine map from pixel space to CRS coordinates.
///
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// `(col, row) = (0, 0)` is the outer corner of the first cell. North-up
/// grids have zero rotation terms and a negative `pixel_height`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    /// Usually negative
    pub pixel_height: f64,
    pub row_rotation: f64,
    pub col_rotation: f64,
}

impl GeoTransform {
    /// North-up transform from the upper-left corner and pixel size
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    fn determinant(&self) -> f64 {
        self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation
    }

    /// CRS coordinates of a fractional pixel position (0.0 = left/top edge)
    pub fn fractional_to_geo(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width + row * self.row_rotation,
            self.origin_y + col * self.col_rotation + row * self.pixel_height,
        )
    }

    /// CRS coordinates of a cell centre
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.fractional_to_geo(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Fractional pixel position of a CRS coordinate; `floor()` gives the cell.
    ///
    /// NaN when the transform is degenerate.
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let det = self.determinant();
        if det.abs() < 1e-10 {
            return (f64::NAN, f64::NAN);
        }
        let dx = x - self.origin_x;
        let dy = y - self.origin_y;
        (
            (self.pixel_height * dx - self.row_rotation * dy) / det,
            (self.pixel_width * dy - self.col_rotation * dx) / det,
        )
    }

    /// Cell size along x; grids here are assumed square
    pub fn cell_size(&self) -> f64 {
        self.spacing_x()
    }

    /// Pixel spacing along the x axis, in CRS units
    pub fn spacing_x(&self) -> f64 {
        self.pixel_width.abs()
    }

    /// Pixel spacing along the y axis, in CRS units
    pub fn spacing_y(&self) -> f64 {
        self.pixel_height.abs()
    }

    /// True when the transform cannot be inverted or has non-finite terms
    pub fn is_degenerate(&self) -> bool {
        let det = self.determinant();
        !det.is_finite()
            || det.abs() < 1e-10
            || !self.origin_x.is_finite()
            || !self.origin_y.is_finite()
    }

    /// All six coefficients within `tol` of each other
    pub fn approx_eq(&self, other: &GeoTransform, tol: f64) -> bool {
        let a = [
            self.origin_x,
            self.origin_y,
            self.pixel_width,
            self.pixel_height,
            self.row_rotation,
            self.col_rotation,
        ];
        let b = [
            other.origin_x,
            other.origin_y,
            other.pixel_width,
            other.pixel_height,
            other.row_rotation,
            other.col_rotation,
        ];
        a.iter().zip(b.iter()).all(|(p, q)| (p - q).abs() <= tol)
    }

    /// `(min_x, min_y, max_x, max_y)` of a `width` x `height` grid
    pub fn bounds(&self, width: usize, height: usize) -> (f64, f64, f64, f64) {
        let (w, h) = (width as f64, height as f64);
        let corners = [
            self.fractional_to_geo(0.0, 0.0),
            self.fractional_to_geo(w, 0.0),
            self.fractional_to_geo(0.0, h),
            self.fractional_to_geo(w, h),
        ];
        corners.iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(x0, y0, x1, y1), &(x, y)| (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        )
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}
