//! Raster element trait for generic cell values

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// Trait for types that can be stored in a raster cell.
///
/// Validity of a cell is tracked by the raster itself; this trait only
/// decides, at construction or read time, whether a raw value can be
/// accepted as valid data.
pub trait RasterElement:
    Copy + Clone + Debug + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// Default no-data sentinel for this type
    fn default_nodata() -> Self;

    /// Whether a raw value is acceptable data given the file's sentinel.
    ///
    /// Floats reject NaN and infinities regardless of the sentinel.
    fn is_valid_value(&self, nodata: Option<Self>) -> bool;

    /// Whether this type is a floating point type
    fn is_float() -> bool;

    /// Convert self to f64
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }
}

macro_rules! impl_raster_element_int {
    ($t:ty) => {
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                <$t>::MIN
            }

            fn is_valid_value(&self, nodata: Option<Self>) -> bool {
                nodata != Some(*self)
            }

            fn is_float() -> bool {
                false
            }
        }
    };
}

macro_rules! impl_raster_element_float {
    ($t:ty) => {
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                -9999.0
            }

            fn is_valid_value(&self, nodata: Option<Self>) -> bool {
                if !self.is_finite() {
                    return false;
                }
                match nodata {
                    Some(nd) if nd.is_finite() => (self - nd).abs() > <$t>::EPSILON * 100.0,
                    _ => true,
                }
            }

            fn is_float() -> bool {
                true
            }
        }
    };
}

impl_raster_element_int!(i16);
impl_raster_element_int!(i32);
impl_raster_element_int!(u8);
impl_raster_element_int!(u16);
impl_raster_element_int!(u32);
impl_raster_element_float!(f32);
impl_raster_element_float!(f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_rejects_non_finite_and_sentinel() {
        assert!(!f64::NAN.is_valid_value(None));
        assert!(!f64::INFINITY.is_valid_value(Some(-9999.0)));
        assert!(!(-9999.0_f64).is_valid_value(Some(-9999.0)));
        assert!(12.5_f64.is_valid_value(Some(-9999.0)));
    }

    #[test]
    fn nan_sentinel_still_accepts_data() {
        assert!(3.0_f32.is_valid_value(Some(f32::NAN)));
    }

    #[test]
    fn int_sentinel() {
        assert!(!0u8.is_valid_value(Some(0)));
        assert!(1u8.is_valid_value(Some(0)));
        assert!(0u8.is_valid_value(None));
    }
}
