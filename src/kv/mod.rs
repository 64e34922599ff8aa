//! Key-Value Tile Codec Module
//!
//! The contract for keeping pyramids in an external sorted key-value table
//! instead of a file tree.
//!
//! ## Row Schema
//! ```text
//! ┌───────────────────────┬──────────────────┬─────────────────┬───────────────┐
//! │ Row                   │ Family           │ Qualifier       │ Value         │
//! ├───────────────────────┼──────────────────┼─────────────────┼───────────────┤
//! │ encode_key(tile_id)   │ zoom ("12")      │ tile id ("42")  │ raster bytes  │
//! │ "~METADATA"           │ "all"            │ "blob"          │ metadata blob │
//! │ "~METADATA"           │ field name       │ zoom            │ field text    │
//! └───────────────────────┴──────────────────┴─────────────────┴───────────────┘
//! ```
//! Tile rows are 8-byte big-endian ids, so byte order equals numeric order.
//! The metadata row is 9 bytes long and can never be mistaken for a tile key.

mod memory;
mod metadata;
mod tiles;

use bytes::Bytes;

use crate::error::Result;
use crate::tile::TileId;

pub use memory::MemoryKvStore;
pub use metadata::{build_from_fields, metadata_mutations, read_metadata, write_metadata};
pub use tiles::{read_tile, scan_tiles, write_tile, write_tiles};

/// Reserved row holding pyramid metadata
pub const METADATA_ROW: &[u8] = b"~METADATA";

/// Family of the metadata blob cell
pub const BLOB_FAMILY: &str = "all";

/// Qualifier of the metadata blob cell
pub const BLOB_QUALIFIER: &str = "blob";

// =============================================================================
// Key Codec
// =============================================================================

/// Encode a tile id as an 8-byte big-endian row key
pub fn encode_key(tile_id: TileId) -> [u8; 8] {
    tile_id.to_be_bytes()
}

/// Decode a row key into a tile id
///
/// Shorter input is right-padded with zero bytes; longer input uses only its
/// first 8 bytes. Truncated keys therefore do not round-trip.
pub fn decode_key(bytes: &[u8]) -> TileId {
    let mut raw = [0u8; 8];
    let n = bytes.len().min(8);
    raw[..n].copy_from_slice(&bytes[..n]);
    TileId::from_be_bytes(raw)
}

// =============================================================================
// Table Contract
// =============================================================================

/// One cell of a sorted table, as written or scanned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub row: Vec<u8>,
    pub family: String,
    pub qualifier: String,
    /// Visibility label; carried, never evaluated
    pub visibility: String,
    pub value: Bytes,
}

impl Cell {
    pub fn new(
        row: impl Into<Vec<u8>>,
        family: impl Into<String>,
        qualifier: impl Into<String>,
        visibility: impl Into<String>,
        value: impl Into<Bytes>,
    ) -> Self {
        Self {
            row: row.into(),
            family: family.into(),
            qualifier: qualifier.into(),
            visibility: visibility.into(),
            value: value.into(),
        }
    }
}

/// A sorted key-value table service
///
/// Implementations report a missing table as `TableNotFound` and an
/// unreachable backend as `BackendUnavailable`.
pub trait KvStore: Send + Sync {
    /// Cells with `start_row <= row <= end_row`, in (row, family, qualifier)
    /// order, optionally restricted to one family
    fn scan(
        &self,
        table: &str,
        start_row: &[u8],
        end_row: &[u8],
        family: Option<&str>,
    ) -> Result<Vec<Cell>>;

    /// Write all mutations or none of them
    ///
    /// A cell with the same (row, family, qualifier) as an existing one
    /// replaces it.
    fn apply(&self, table: &str, mutations: Vec<Cell>) -> Result<()>;
}
