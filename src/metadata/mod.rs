//! Pyramid Metadata Module
//!
//! The descriptive record of one tile pyramid and its self-checking blob form.
//!
//! ## Blob Format
//! ```text
//! ┌──────────────┬──────────────────────────────────┐
//! │ CRC32 (4 LE) │ bincode(PyramidMetadata)         │
//! └──────────────┴──────────────────────────────────┘
//! ```
//! The checksum covers the bincode body. A blob that fails either the
//! checksum or decoding is `CorruptMetadataBlob`; readers fall back to the
//! per-field cells in that case.

mod cache;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};
use crate::tile::{Bounds, TileBounds};

pub use cache::MetadataCache;

// =============================================================================
// Classification
// =============================================================================

/// How pixel values should be interpreted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    #[default]
    Continuous,
    Categorical,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Continuous => f.write_str("Continuous"),
            Classification::Categorical => f.write_str("Categorical"),
        }
    }
}

impl FromStr for Classification {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Continuous" => Ok(Classification::Continuous),
            "Categorical" => Ok(Classification::Categorical),
            other => Err(VaultError::Serialization(format!(
                "unknown classification: {:?}",
                other
            ))),
        }
    }
}

// =============================================================================
// Pixel Bounds
// =============================================================================

/// Pixel extent of the source image at one zoom level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelBounds {
    pub min_x: i64,
    pub min_y: i64,
    pub max_x: i64,
    pub max_y: i64,
}

impl PixelBounds {
    pub const fn new(min_x: i64, min_y: i64, max_x: i64, max_y: i64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }
}

impl fmt::Display for PixelBounds {
    /// `min_x,min_y,max_x,max_y`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.min_x, self.min_y, self.max_x, self.max_y)
    }
}

impl FromStr for PixelBounds {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self> {
        let values = s
            .split(',')
            .map(|v| v.trim().parse::<i64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| VaultError::Serialization(format!("{:?}: {}", s, e)))?;

        match values.as_slice() {
            [min_x, min_y, max_x, max_y] => Ok(Self::new(*min_x, *min_y, *max_x, *max_y)),
            _ => Err(VaultError::Serialization(format!(
                "expected 4 comma-separated values, got {:?}",
                s
            ))),
        }
    }
}

// =============================================================================
// Pyramid Metadata
// =============================================================================

/// Descriptive record of one tile pyramid
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PyramidMetadata {
    /// Pyramid name
    pub name: String,
    pub max_zoom: u32,
    /// Geographic extent
    pub bounds: Bounds,
    /// Tile rectangle per zoom level
    pub tile_bounds: BTreeMap<u32, TileBounds>,
    /// Source pixel rectangle per zoom level
    pub pixel_bounds: BTreeMap<u32, PixelBounds>,
    pub bands: u32,
    pub classification: Classification,
    /// No-data value per band
    pub default_values: Vec<f64>,
    /// Image (level) name per zoom level
    pub image_names: BTreeMap<u32, String>,
    /// Tile edge length in pixels
    pub tile_size: u32,
}

impl PyramidMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn tile_bounds_at(&self, zoom: u32) -> Option<&TileBounds> {
        self.tile_bounds.get(&zoom)
    }

    pub fn pixel_bounds_at(&self, zoom: u32) -> Option<&PixelBounds> {
        self.pixel_bounds.get(&zoom)
    }

    pub fn image_name(&self, zoom: u32) -> Option<&str> {
        self.image_names.get(&zoom).map(String::as_str)
    }

    /// Encode as `[crc32 LE][bincode body]`
    pub fn to_blob(&self) -> Result<Vec<u8>> {
        let body = bincode::serialize(self)
            .map_err(|e| VaultError::Serialization(format!("metadata encode: {}", e)))?;

        let mut blob = Vec::with_capacity(4 + body.len());
        blob.extend_from_slice(&crc32fast::hash(&body).to_le_bytes());
        blob.extend_from_slice(&body);
        Ok(blob)
    }

    /// Decode a blob produced by [`PyramidMetadata::to_blob`]
    pub fn from_blob(blob: &[u8]) -> Result<Self> {
        if blob.len() < 4 {
            return Err(VaultError::CorruptMetadataBlob(format!(
                "blob too short: {} bytes",
                blob.len()
            )));
        }

        let (crc_bytes, body) = blob.split_at(4);
        let stored = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
        let actual = crc32fast::hash(body);
        if stored != actual {
            return Err(VaultError::CorruptMetadataBlob(format!(
                "checksum mismatch: stored {:08x}, computed {:08x}",
                stored, actual
            )));
        }

        bincode::deserialize(body).map_err(|e| VaultError::CorruptMetadataBlob(e.to_string()))
    }
}
