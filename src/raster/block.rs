//! Raster blocks
//!
//! `Raster<P>` owns `[header][pixel data]` for one pixel type.
//! `RasterBlock` is the closed set of those, selected by the header tag.

use std::marker::PhantomData;

use bytes::Bytes;

use crate::error::{Result, VaultError};

use super::pixel::Pixel;
use super::{buffer_len, read_header, write_header, PixelType, HEADER_LEN};

// =============================================================================
// Typed Raster
// =============================================================================

/// Pixel block whose samples are all of type `P`
#[derive(Debug, Clone, PartialEq)]
pub struct Raster<P: Pixel> {
    width: u32,
    height: u32,
    bands: u32,
    /// Header followed by pixel data
    data: Vec<u8>,
    _pixel: PhantomData<P>,
}

impl<P: Pixel> Raster<P> {
    /// Allocate a zero-filled raster
    ///
    /// Fails with `RasterTooLarge` if the buffer would exceed the addressable
    /// size; nothing is allocated in that case.
    pub fn new(width: u32, height: u32, bands: u32) -> Result<Self> {
        let len = buffer_len(width, height, bands, P::TYPE)?;

        let mut data = vec![0u8; len];
        write_header(&mut data, width, height, bands, P::TYPE);

        Ok(Self {
            width,
            height,
            bands,
            data,
            _pixel: PhantomData,
        })
    }

    /// Decode a serialized raster whose header tag must be `P::TYPE`
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let (width, height, bands, tag) = read_header(bytes)?;

        if tag != P::TYPE.tag() {
            return Err(VaultError::CorruptRaster(format!(
                "pixel type tag {} does not match expected {} ({})",
                tag,
                P::TYPE.tag(),
                P::TYPE
            )));
        }

        let expected = buffer_len(width, height, bands, P::TYPE)?;
        if bytes.len() != expected {
            return Err(VaultError::CorruptRaster(format!(
                "length mismatch for {}x{}x{} {} raster: expected {} bytes, got {}",
                width,
                height,
                bands,
                P::TYPE,
                expected,
                bytes.len()
            )));
        }

        Ok(Self {
            width,
            height,
            bands,
            data: bytes.to_vec(),
            _pixel: PhantomData,
        })
    }

    /// Byte offset of a sample, bounds-checked
    #[inline]
    fn offset(&self, x: u32, y: u32, band: u32) -> Result<usize> {
        if x >= self.width || y >= self.height || band >= self.bands {
            return Err(VaultError::PixelOutOfRange {
                x,
                y,
                band,
                width: self.width,
                height: self.height,
                bands: self.bands,
            });
        }

        // Cannot overflow: the whole buffer length was checked at construction
        let index = (y as usize * self.width as usize + x as usize) * self.bands as usize
            + band as usize;
        Ok(HEADER_LEN + index * P::BYTES)
    }

    /// Read a sample in its native type
    #[inline]
    pub fn get_raw(&self, x: u32, y: u32, band: u32) -> Result<P> {
        let offset = self.offset(x, y, band)?;
        Ok(P::read(&self.data[offset..offset + P::BYTES]))
    }

    /// Write a sample in its native type
    #[inline]
    pub fn set_raw(&mut self, x: u32, y: u32, band: u32, value: P) -> Result<()> {
        let offset = self.offset(x, y, band)?;
        value.write(&mut self.data[offset..offset + P::BYTES]);
        Ok(())
    }

    /// Read a sample converted to `T`
    #[inline]
    pub fn get<T: Pixel>(&self, x: u32, y: u32, band: u32) -> Result<T> {
        Ok(self.get_raw(x, y, band)?.cast())
    }

    /// Write a sample converted from `T`
    #[inline]
    pub fn set<T: Pixel>(&mut self, x: u32, y: u32, band: u32, value: T) -> Result<()> {
        self.set_raw(x, y, band, value.cast())
    }

    /// Set every sample of every band
    pub fn fill<T: Pixel>(&mut self, value: T) {
        let mut encoded = vec![0u8; P::BYTES];
        value.cast::<P>().write(&mut encoded);

        for sample in self.data[HEADER_LEN..].chunks_exact_mut(P::BYTES) {
            sample.copy_from_slice(&encoded);
        }
    }

    /// Set every sample of one band
    pub fn fill_band<T: Pixel>(&mut self, band: u32, value: T) -> Result<()> {
        if band >= self.bands {
            return Err(VaultError::PixelOutOfRange {
                x: 0,
                y: 0,
                band,
                width: self.width,
                height: self.height,
                bands: self.bands,
            });
        }

        if self.data.len() == HEADER_LEN {
            return Ok(());
        }

        let mut encoded = vec![0u8; P::BYTES];
        value.cast::<P>().write(&mut encoded);

        let stride = self.bands as usize * P::BYTES;
        let start = HEADER_LEN + band as usize * P::BYTES;
        for pixel in self.data[start..].chunks_mut(stride) {
            pixel[..P::BYTES].copy_from_slice(&encoded);
        }
        Ok(())
    }

    /// Native samples in storage order
    pub fn samples(&self) -> impl Iterator<Item = P> + '_ {
        self.data[HEADER_LEN..].chunks_exact(P::BYTES).map(P::read)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bands(&self) -> u32 {
        self.bands
    }

    /// Header plus pixel data
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

// =============================================================================
// Raster Block
// =============================================================================

/// A raster of any supported pixel type
#[derive(Debug, Clone, PartialEq)]
pub enum RasterBlock {
    Byte(Raster<u8>),
    UShort(Raster<u16>),
    Short(Raster<i16>),
    Int(Raster<i32>),
    Float(Raster<f32>),
    Double(Raster<f64>),
}

/// Run `$body` with `$r` bound to the typed raster inside `$block`
macro_rules! dispatch {
    ($block:expr, $r:ident => $body:expr) => {
        match $block {
            RasterBlock::Byte($r) => $body,
            RasterBlock::UShort($r) => $body,
            RasterBlock::Short($r) => $body,
            RasterBlock::Int($r) => $body,
            RasterBlock::Float($r) => $body,
            RasterBlock::Double($r) => $body,
        }
    };
}

impl RasterBlock {
    /// Allocate a zero-filled raster of the given pixel type
    pub fn create_empty(width: u32, height: u32, bands: u32, pixel_type: PixelType) -> Result<Self> {
        match pixel_type {
            PixelType::Byte => Raster::<u8>::new(width, height, bands).map(RasterBlock::Byte),
            PixelType::UShort => Raster::<u16>::new(width, height, bands).map(RasterBlock::UShort),
            PixelType::Short => Raster::<i16>::new(width, height, bands).map(RasterBlock::Short),
            PixelType::Int => Raster::<i32>::new(width, height, bands).map(RasterBlock::Int),
            PixelType::Float => Raster::<f32>::new(width, height, bands).map(RasterBlock::Float),
            PixelType::Double => Raster::<f64>::new(width, height, bands).map(RasterBlock::Double),
        }
    }

    /// Decode a serialized raster, selecting the codec from the header tag
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let (_, _, _, tag) = read_header(bytes)?;
        let pixel_type = PixelType::from_tag(tag)
            .ok_or_else(|| VaultError::CorruptRaster(format!("unknown pixel type tag {}", tag)))?;

        match pixel_type {
            PixelType::Byte => Raster::<u8>::deserialize(bytes).map(RasterBlock::Byte),
            PixelType::UShort => Raster::<u16>::deserialize(bytes).map(RasterBlock::UShort),
            PixelType::Short => Raster::<i16>::deserialize(bytes).map(RasterBlock::Short),
            PixelType::Int => Raster::<i32>::deserialize(bytes).map(RasterBlock::Int),
            PixelType::Float => Raster::<f32>::deserialize(bytes).map(RasterBlock::Float),
            PixelType::Double => Raster::<f64>::deserialize(bytes).map(RasterBlock::Double),
        }
    }

    /// Encoded form (header + pixel data)
    pub fn serialize(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8] {
        dispatch!(self, r => r.as_bytes())
    }

    pub fn into_bytes(self) -> Bytes {
        dispatch!(self, r => Bytes::from(r.into_vec()))
    }

    /// Read a sample converted to `T`
    pub fn get_pixel<T: Pixel>(&self, x: u32, y: u32, band: u32) -> Result<T> {
        dispatch!(self, r => r.get::<T>(x, y, band))
    }

    /// Write a sample converted to the raster's pixel type
    pub fn set_pixel<T: Pixel>(&mut self, x: u32, y: u32, band: u32, value: T) -> Result<()> {
        dispatch!(self, r => r.set(x, y, band, value))
    }

    pub fn fill<T: Pixel>(&mut self, value: T) {
        dispatch!(self, r => r.fill(value))
    }

    pub fn fill_band<T: Pixel>(&mut self, band: u32, value: T) -> Result<()> {
        dispatch!(self, r => r.fill_band(band, value))
    }

    pub fn pixel_type(&self) -> PixelType {
        match self {
            RasterBlock::Byte(_) => PixelType::Byte,
            RasterBlock::UShort(_) => PixelType::UShort,
            RasterBlock::Short(_) => PixelType::Short,
            RasterBlock::Int(_) => PixelType::Int,
            RasterBlock::Float(_) => PixelType::Float,
            RasterBlock::Double(_) => PixelType::Double,
        }
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.pixel_type().bytes_per_pixel()
    }

    pub fn width(&self) -> u32 {
        dispatch!(self, r => r.width())
    }

    pub fn height(&self) -> u32 {
        dispatch!(self, r => r.height())
    }

    pub fn bands(&self) -> u32 {
        dispatch!(self, r => r.bands())
    }

    /// Total encoded length in bytes
    pub fn data_len(&self) -> usize {
        self.as_bytes().len()
    }
}

impl<P: Pixel> From<Raster<P>> for RasterBlock {
    fn from(raster: Raster<P>) -> Self {
        P::wrap(raster)
    }
}
