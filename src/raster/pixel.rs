//! Pixel sample types
//!
//! One implementation per supported pixel type. Conversions between types use
//! Rust `as` semantics: floats truncate toward zero (saturating, NaN → 0),
//! integers narrow by keeping the low bits, unsigned values zero-extend.

use std::fmt::Debug;

use super::block::{Raster, RasterBlock};
use super::PixelType;

/// A sample type a raster can store
pub trait Pixel: Copy + Default + PartialEq + Debug + Send + Sync + 'static {
    /// Header tag of rasters holding this type
    const TYPE: PixelType;

    /// Encoded width of one sample
    const BYTES: usize;

    const IS_FLOAT: bool;

    /// Decode from exactly `BYTES` big-endian bytes
    fn read(bytes: &[u8]) -> Self;

    /// Encode into exactly `BYTES` big-endian bytes
    fn write(self, bytes: &mut [u8]);

    fn to_f64(self) -> f64;
    fn from_f64(value: f64) -> Self;
    fn to_i64(self) -> i64;
    fn from_i64(value: i64) -> Self;

    /// Lift a typed raster into the closed variant set
    fn wrap(raster: Raster<Self>) -> RasterBlock;

    /// Convert to another sample type
    #[inline]
    fn cast<T: Pixel>(self) -> T {
        if Self::IS_FLOAT || T::IS_FLOAT {
            T::from_f64(self.to_f64())
        } else {
            T::from_i64(self.to_i64())
        }
    }
}

macro_rules! impl_pixel {
    ($ty:ty, $variant:ident, $is_float:expr) => {
        impl Pixel for $ty {
            const TYPE: PixelType = PixelType::$variant;
            const BYTES: usize = std::mem::size_of::<$ty>();
            const IS_FLOAT: bool = $is_float;

            #[inline]
            fn read(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$ty>()];
                buf.copy_from_slice(bytes);
                <$ty>::from_be_bytes(buf)
            }

            #[inline]
            fn write(self, bytes: &mut [u8]) {
                bytes.copy_from_slice(&self.to_be_bytes());
            }

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn from_f64(value: f64) -> Self {
                value as $ty
            }

            #[inline]
            fn to_i64(self) -> i64 {
                self as i64
            }

            #[inline]
            fn from_i64(value: i64) -> Self {
                value as $ty
            }

            fn wrap(raster: Raster<Self>) -> RasterBlock {
                RasterBlock::$variant(raster)
            }
        }
    };
}

impl_pixel!(u8, Byte, false);
impl_pixel!(u16, UShort, false);
impl_pixel!(i16, Short, false);
impl_pixel!(i32, Int, false);
impl_pixel!(f32, Float, true);
impl_pixel!(f64, Double, true);
