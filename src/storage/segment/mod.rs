//! Segment Module
//!
//! Immutable on-disk file holding the encoded rasters of one contiguous run of
//! tile ids at one zoom level. A segment's first and last tile ids are what the
//! split index is generated from.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header (14 bytes)                                       │
//! │   Magic: "TVSG" (4) | Version: u16 (2) | Count: u64 (8) │
//! ├─────────────────────────────────────────────────────────┤
//! │ Data Block (variable)                                   │
//! │   [TileId: u64][Len: u32][Raster bytes]                 │
//! │   ... repeated for each tile, ascending tile id ...     │
//! ├─────────────────────────────────────────────────────────┤
//! │ Index Block (16 bytes per tile)                         │
//! │   [TileId: u64][Offset: u64]                            │
//! ├─────────────────────────────────────────────────────────┤
//! │ Footer (16 bytes)                                       │
//! │   IndexOffset: u64 (8) | DataCRC: u32 (4) | Padding (4) │
//! └─────────────────────────────────────────────────────────┘
//! ```
//! All integers little-endian. The raster bytes are the raster codec's own
//! big-endian layout, stored verbatim.

mod builder;
mod iterator;
mod reader;

use std::path::PathBuf;

use crate::index::SegmentInfo;
use crate::tile::TileId;

pub use builder::SegmentBuilder;
pub use iterator::SegmentIterator;
pub use reader::SegmentReader;

// =============================================================================
// Shared Constants (used by builder, reader, iterator)
// =============================================================================

/// Magic bytes identifying a segment file
pub(crate) const MAGIC: &[u8; 4] = b"TVSG";

/// Current segment format version
pub(crate) const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + TileCount (8) = 14 bytes
pub(crate) const HEADER_SIZE: u64 = 14;

/// Footer size: IndexOffset (8) + DataCRC (4) + Padding (4) = 16 bytes
pub(crate) const FOOTER_SIZE: u64 = 16;

/// Per-tile data header: TileId (8) + Len (4)
pub(crate) const ENTRY_HEADER_SIZE: u64 = 12;

/// Per-tile index record: TileId (8) + Offset (8)
pub(crate) const INDEX_ENTRY_SIZE: u64 = 16;

// =============================================================================
// Segment Metadata
// =============================================================================

/// What `SegmentBuilder::finish` produced
#[derive(Debug, Clone)]
pub struct Segment {
    pub path: PathBuf,
    pub tile_count: u64,
    pub min_tile: TileId,
    pub max_tile: TileId,
    pub file_size: u64,
}

impl Segment {
    /// File name, as recorded in split indexes
    pub fn name(&self) -> String {
        segment_name(&self.path)
    }

    pub fn info(&self) -> SegmentInfo {
        SegmentInfo::new(self.name(), self.min_tile, self.max_tile)
    }
}

pub(crate) fn segment_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub(crate) fn le_u32(bytes: &[u8]) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(raw)
}

pub(crate) fn le_u64(bytes: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(raw)
}
