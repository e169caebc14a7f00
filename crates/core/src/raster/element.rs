//! Raster element trait for generic cell values

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// Trait for types that can be stored in a raster cell.
///
/// Categorical rasters use `i32` (no-data `i32::MIN`), continuous rasters
/// use `f64` (no-data NaN) and direction rasters use `u8` (no-data 255).
/// The remaining impls exist so GeoTIFF inputs of other pixel types can be
/// read without a detour.
pub trait RasterElement:
    Copy + Clone + Debug + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// Sentinel written into cells that carry no value
    fn default_nodata() -> Self;

    /// Check if this value represents no-data
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    /// Whether this type is a floating point type
    fn is_float() -> bool;

    /// Lossy cast from `f64`; `None` when the value does not fit.
    fn from_f64(value: f64) -> Option<Self> {
        NumCast::from(value)
    }
}

macro_rules! impl_raster_element_int {
    ($t:ty, $nodata:expr) => {
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                $nodata
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                nodata.is_some_and(|nd| *self == nd)
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
                <$t>::NAN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                if self.is_nan() {
                    return true;
                }
                match nodata {
                    Some(nd) if nd.is_nan() => false,
                    Some(nd) => (self - nd).abs() <= <$t>::EPSILON * nd.abs().max(1.0),
                    None => false,
                }
            }

            fn is_float() -> bool {
                true
            }
        }
    };
}

// Unsigned types reserve their maximum so that zero stays a valid code.
impl_raster_element_int!(u8, u8::MAX);
impl_raster_element_int!(u16, u16::MAX);
impl_raster_element_int!(i16, i16::MIN);
impl_raster_element_int!(i32, i32::MIN);
impl_raster_element_int!(i64, i64::MIN);
impl_raster_element_float!(f32);
impl_raster_element_float!(f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nan_is_always_nodata() {
        assert!(f64::NAN.is_nodata(None));
        assert!(f64::NAN.is_nodata(Some(-9999.0)));
        assert!(!1.0_f64.is_nodata(Some(f64::NAN)));
    }

    #[test]
    fn test_sentinel_nodata() {
        assert!((-9999.0_f32).is_nodata(Some(-9999.0)));
        assert!(i32::MIN.is_nodata(Some(i32::default_nodata())));
        assert!(!0_i32.is_nodata(None));
    }

    #[test]
    fn test_from_f64_out_of_range() {
        assert_eq!(<u8 as RasterElement>::from_f64(300.0), None);
        assert_eq!(<i32 as RasterElement>::from_f64(110.0), Some(110));
    }
}
