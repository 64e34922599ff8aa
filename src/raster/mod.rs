//! Raster Codec Module
//!
//! Packs one tile's pixels into a self-describing byte buffer.
//!
//! ## Binary Layout
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │ Header (16 bytes, big-endian u32 fields)                  │
//! │ ┌───────────┬────────────┬───────────┬──────────────────┐ │
//! │ │ Width (4) │ Height (4) │ Bands (4) │ Pixel Type (4)   │ │
//! │ └───────────┴────────────┴───────────┴──────────────────┘ │
//! ├───────────────────────────────────────────────────────────┤
//! │ Pixel Data (row-major, band-interleaved-by-pixel)         │
//! │   (x0,y0,b0) (x0,y0,b1) ... (x1,y0,b0) ...                │
//! │   each sample is bytes_per_pixel wide, big-endian         │
//! └───────────────────────────────────────────────────────────┘
//!
//! offset(x, y, band) = 16 + ((y * width + x) * bands + band) * bytes_per_pixel
//! ```
//!
//! ## Pixel Types
//! | Tag | Type   | Bytes |
//! |-----|--------|-------|
//! | 0   | u8     | 1     |
//! | 1   | u16    | 2     |
//! | 2   | i16    | 2     |
//! | 3   | i32    | 4     |
//! | 4   | f32    | 4     |
//! | 5   | f64    | 8     |
//!
//! Each pixel type is its own codec, [`Raster<P>`], sharing the offset
//! formula. [`RasterBlock`] is the closed set of those codecs; the variant is
//! chosen once from the header tag, so typed loops over a `Raster<P>` never
//! dispatch per pixel.

mod block;
mod pixel;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};

pub use block::{Raster, RasterBlock};
pub use pixel::Pixel;

// =============================================================================
// Shared Constants
// =============================================================================

/// Header size: Width (4) + Height (4) + Bands (4) + PixelType (4) = 16 bytes
pub const HEADER_LEN: usize = 16;

/// Largest buffer a raster may occupy (header included)
pub const MAX_RASTER_BYTES: u128 = isize::MAX as u128;

// =============================================================================
// Pixel Type Tag
// =============================================================================

/// Numeric encoding of a raster's samples, stored as the header's type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum PixelType {
    Byte = 0,
    UShort = 1,
    Short = 2,
    Int = 3,
    Float = 4,
    Double = 5,
}

impl PixelType {
    pub const ALL: [PixelType; 6] = [
        PixelType::Byte,
        PixelType::UShort,
        PixelType::Short,
        PixelType::Int,
        PixelType::Float,
        PixelType::Double,
    ];

    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelType::Byte => 1,
            PixelType::UShort | PixelType::Short => 2,
            PixelType::Int | PixelType::Float => 4,
            PixelType::Double => 8,
        }
    }

    pub fn tag(self) -> u32 {
        self as u32
    }

    pub fn from_tag(tag: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }
}

impl fmt::Display for PixelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PixelType::Byte => "u8",
            PixelType::UShort => "u16",
            PixelType::Short => "i16",
            PixelType::Int => "i32",
            PixelType::Float => "f32",
            PixelType::Double => "f64",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Header Helpers (used by block)
// =============================================================================

/// Total buffer length for the given dimensions, or `RasterTooLarge`
pub(crate) fn buffer_len(width: u32, height: u32, bands: u32, pixel_type: PixelType) -> Result<usize> {
    let bytes_per_pixel = pixel_type.bytes_per_pixel();
    let total_bytes = HEADER_LEN as u128
        + width as u128 * height as u128 * bands as u128 * bytes_per_pixel as u128;

    if total_bytes > MAX_RASTER_BYTES {
        return Err(VaultError::RasterTooLarge {
            width,
            height,
            bands,
            bytes_per_pixel,
            total_bytes,
        });
    }

    Ok(total_bytes as usize)
}

pub(crate) fn write_header(buf: &mut [u8], width: u32, height: u32, bands: u32, pixel_type: PixelType) {
    buf[0..4].copy_from_slice(&width.to_be_bytes());
    buf[4..8].copy_from_slice(&height.to_be_bytes());
    buf[8..12].copy_from_slice(&bands.to_be_bytes());
    buf[12..16].copy_from_slice(&pixel_type.tag().to_be_bytes());
}

/// Parsed header fields: (width, height, bands, raw type tag)
pub(crate) fn read_header(bytes: &[u8]) -> Result<(u32, u32, u32, u32)> {
    if bytes.len() < HEADER_LEN {
        return Err(VaultError::CorruptRaster(format!(
            "buffer too short for header: expected at least {} bytes, got {}",
            HEADER_LEN,
            bytes.len()
        )));
    }

    let field = |i: usize| u32::from_be_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
    Ok((field(0), field(4), field(8), field(12)))
}
