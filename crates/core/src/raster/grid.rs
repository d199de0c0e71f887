//! Main Raster type

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, GridSpec, RasterElement};
use ndarray::Array2;

/// A georeferenced 2D raster grid with an explicit validity grid.
///
/// `Raster<T>` stores values of type `T` in a 2D grid alongside a boolean
/// grid of the same shape that says whether each cell carries data. The
/// no-data sentinel is kept only as metadata for writing files; inside the
/// engine "is this cell valid" is always answered by [`Raster::value`] or
/// [`Raster::is_valid`].
///
/// # Example
///
/// ```ignore
/// use rusle_core::Raster;
///
/// let mut dem: Raster<f64> = Raster::new(100, 100);
/// dem.set(10, 20, 42.0)?;
/// dem.set_invalid(0, 0)?;
///
/// assert_eq!(dem.value(10, 20), Some(42.0));
/// assert_eq!(dem.value(0, 0), None);
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    /// Raster data stored in row-major order (row, col)
    data: Array2<T>,
    /// Per-cell validity, same shape as `data`
    valid: Array2<bool>,
    /// Affine transformation
    transform: GeoTransform,
    /// Coordinate reference system
    crs: Option<CRS>,
    /// Sentinel written for invalid cells when persisting
    nodata: T,
}

impl<T: RasterElement> Raster<T> {
    /// Create a new raster filled with zeros, every cell valid
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::filled(rows, cols, T::zero())
    }

    /// Create a new raster filled with a specific value, every cell valid
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self {
            data: Array2::from_elem((rows, cols), value),
            valid: Array2::from_elem((rows, cols), true),
            transform: GeoTransform::default(),
            crs: None,
            nodata: T::default_nodata(),
        }
    }

    /// Create a raster where no cell carries data yet
    pub fn empty(rows: usize, cols: usize) -> Self {
        Self {
            data: Array2::zeros((rows, cols)),
            valid: Array2::from_elem((rows, cols), false),
            transform: GeoTransform::default(),
            crs: None,
            nodata: T::default_nodata(),
        }
    }

    /// Create an all-invalid raster laid out on a grid specification
    pub fn from_spec(spec: &GridSpec) -> Self {
        let mut raster = Self::empty(spec.rows, spec.cols);
        raster.transform = spec.transform;
        raster.crs = spec.crs.clone();
        raster.nodata = num_traits::cast(spec.nodata).unwrap_or(T::default_nodata());
        raster
    }

    /// Create a raster from existing data.
    ///
    /// Non-finite floats are marked invalid.
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        Self::from_vec_with_nodata(data, rows, cols, None)
    }

    /// Create a raster from existing data, marking cells equal to `nodata` invalid
    pub fn from_vec_with_nodata(
        data: Vec<T>,
        rows: usize,
        cols: usize,
        nodata: Option<T>,
    ) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;
        let valid = array.map(|v| v.is_valid_value(nodata));

        Ok(Self {
            data: array,
            valid,
            transform: GeoTransform::default(),
            crs: None,
            nodata: nodata.unwrap_or(T::default_nodata()),
        })
    }

    /// Create a raster from an ndarray; non-finite floats are marked invalid
    pub fn from_array(data: Array2<T>) -> Self {
        let valid = data.map(|v| v.is_valid_value(None));
        Self {
            data,
            valid,
            transform: GeoTransform::default(),
            crs: None,
            nodata: T::default_nodata(),
        }
    }

    /// Create a raster from a value array and a validity array of the same shape
    pub fn from_parts(data: Array2<T>, valid: Array2<bool>) -> Result<Self> {
        if data.dim() != valid.dim() {
            let (er, ec) = data.dim();
            let (ar, ac) = valid.dim();
            return Err(Error::SizeMismatch { er, ec, ar, ac });
        }
        Ok(Self {
            data,
            valid,
            transform: GeoTransform::default(),
            crs: None,
            nodata: T::default_nodata(),
        })
    }

    /// Replace the values and validity while keeping this raster's metadata.
    pub fn with_data<U: RasterElement>(
        &self,
        data: Array2<U>,
        valid: Array2<bool>,
    ) -> Result<Raster<U>> {
        if data.dim() != self.shape() || valid.dim() != self.shape() {
            let (er, ec) = self.shape();
            let (ar, ac) = if data.dim() != self.shape() { data.dim() } else { valid.dim() };
            return Err(Error::SizeMismatch { er, ec, ar, ac });
        }
        Ok(Raster {
            data,
            valid,
            transform: self.transform,
            crs: self.crs.clone(),
            nodata: U::default_nodata(),
        })
    }

    // Dimensions

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the raster is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether (row, col) lies on the outermost one-cell ring
    pub fn is_border(&self, row: usize, col: usize) -> bool {
        row == 0 || col == 0 || row + 1 == self.rows() || col + 1 == self.cols()
    }

    // Data access

    /// Get the value at (row, col); `Ok(None)` for an invalid cell
    pub fn get(&self, row: usize, col: usize) -> Result<Option<T>> {
        if row >= self.rows() || col >= self.cols() {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        Ok(self.value(row, col))
    }

    /// Value at (row, col) if the cell is inside the grid and valid
    #[inline]
    pub fn value(&self, row: usize, col: usize) -> Option<T> {
        match self.valid.get((row, col)) {
            Some(true) => Some(self.data[(row, col)]),
            _ => None,
        }
    }

    /// Value at a signed offset from (row, col), if inside the grid and valid
    #[inline]
    pub fn value_at_offset(&self, row: usize, col: usize, dr: isize, dc: isize) -> Option<T> {
        let nr = row.checked_add_signed(dr)?;
        let nc = col.checked_add_signed(dc)?;
        self.value(nr, nc)
    }

    /// Whether (row, col) is inside the grid and carries data
    #[inline]
    pub fn is_valid(&self, row: usize, col: usize) -> bool {
        matches!(self.valid.get((row, col)), Some(true))
    }

    /// Set value at (row, col) and mark the cell valid
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        self.check_bounds(row, col)?;
        self.data[(row, col)] = value;
        self.valid[(row, col)] = true;
        Ok(())
    }

    /// Mark (row, col) as no-data
    pub fn set_invalid(&mut self, row: usize, col: usize) -> Result<()> {
        self.check_bounds(row, col)?;
        self.data[(row, col)] = T::zero();
        self.valid[(row, col)] = false;
        Ok(())
    }

    fn check_bounds(&self, row: usize, col: usize) -> Result<()> {
        if row >= self.rows() || col >= self.cols() {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        Ok(())
    }

    /// Get a reference to the underlying value array
    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    /// Get a reference to the validity grid
    pub fn validity(&self) -> &Array2<bool> {
        &self.valid
    }

    /// Iterate over valid cells as ((row, col), value)
    pub fn iter_valid(&self) -> impl Iterator<Item = ((usize, usize), T)> + '_ {
        self.data
            .indexed_iter()
            .zip(self.valid.iter())
            .filter_map(|((idx, &v), &ok)| ok.then_some((idx, v)))
    }

    /// Number of valid cells
    pub fn valid_count(&self) -> usize {
        self.valid.iter().filter(|&&v| v).count()
    }

    /// Values in row-major order with invalid cells replaced by `fill`
    pub fn to_filled_vec(&self, fill: T) -> Vec<T> {
        self.data
            .iter()
            .zip(self.valid.iter())
            .map(|(&v, &ok)| if ok { v } else { fill })
            .collect()
    }

    /// Invalidate every cell for which `keep` returns false
    pub fn retain_valid<F>(&mut self, mut keep: F)
    where
        F: FnMut(usize, usize, T) -> bool,
    {
        for ((row, col), ok) in self.valid.indexed_iter_mut() {
            if *ok && !keep(row, col, self.data[(row, col)]) {
                *ok = false;
                self.data[(row, col)] = T::zero();
            }
        }
    }

    // Metadata

    /// Get the geotransform
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Set the geotransform
    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    /// Get the CRS
    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    /// Set the CRS
    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    /// Get the no-data sentinel used when persisting
    pub fn nodata(&self) -> T {
        self.nodata
    }

    /// Set the no-data sentinel used when persisting
    pub fn set_nodata(&mut self, nodata: T) {
        self.nodata = nodata;
    }

    /// Cell size (assumes square cells)
    pub fn cell_size(&self) -> f64 {
        self.transform.cell_size()
    }

    /// Geographic bounds (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols(), self.rows())
    }

    /// The grid specification this raster lives on
    pub fn spec(&self) -> GridSpec {
        GridSpec {
            crs: self.crs.clone(),
            transform: self.transform,
            rows: self.rows(),
            cols: self.cols(),
            nodata: self.nodata.to_f64().unwrap_or(-9999.0),
        }
    }

    // Coordinate conversion

    /// Convert pixel coordinates to geographic coordinates
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.transform.pixel_to_geo(col, row)
    }

    /// Convert geographic coordinates to pixel coordinates
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        self.transform.geo_to_pixel(x, y)
    }

    // Statistics

    /// Calculate basic statistics over valid cells
    pub fn statistics(&self) -> RasterStatistics<T> {
        let mut min: Option<T> = None;
        let mut max: Option<T> = None;
        let mut sum: f64 = 0.0;
        let mut count: usize = 0;

        for (_, value) in self.iter_valid() {
            if min.map_or(true, |m| value < m) {
                min = Some(value);
            }
            if max.map_or(true, |m| value > m) {
                max = Some(value);
            }
            if let Some(v) = value.to_f64() {
                sum += v;
                count += 1;
            }
        }

        let mean = if count > 0 {
            Some(sum / count as f64)
        } else {
            None
        };

        RasterStatistics {
            min,
            max,
            mean,
            valid_count: count,
            nodata_count: self.len() - count,
        }
    }
}

/// Basic statistics for a raster
#[derive(Debug, Clone)]
pub struct RasterStatistics<T> {
    pub min: Option<T>,
    pub max: Option<T>,
    pub mean: Option<f64>,
    pub valid_count: usize,
    pub nodata_count: usize,
}
