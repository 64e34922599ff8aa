//! # TileVault
//!
//! Storage engine for tiled raster pyramids:
//! - Tile addressing: (zoom, col, row) ↔ 64-bit tile id
//! - A compact, self-describing raster codec for one tile's pixels
//! - Split indexes mapping tile-id ranges to on-disk segments
//! - Split stitching: one deduplicated partition list over many pyramids
//! - A key-value contract for pyramids kept in a sorted table
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     PyramidStore                            │
//! │        (write tiles, plan jobs, read partitions)            │
//! └──────┬──────────────────┬──────────────────┬────────────────┘
//!        │                  │                  │
//!        ▼                  ▼                  ▼
//!  ┌───────────┐     ┌─────────────┐    ┌──────────────┐
//!  │  Stitch   │────▶│ Split Index │    │   Metadata   │
//!  │ (planner) │     │ (per level) │    │ (blob+cache) │
//!  └───────────┘     └──────┬──────┘    └──────┬───────┘
//!                           │                  │
//!                           ▼                  ▼
//!                    ┌─────────────┐    ┌──────────────┐
//!                    │  Segments   │    │   KvStore    │
//!                    │ (storage)   │    │ (kv tables)  │
//!                    └──────┬──────┘    └──────────────┘
//!                           │
//!                           ▼
//!                    ┌─────────────┐
//!                    │   Raster    │
//!                    │   codec     │
//!                    └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod tile;
pub mod raster;
pub mod index;
pub mod stitch;
pub mod storage;
pub mod metadata;
pub mod kv;
pub mod store;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, VaultError};
pub use config::Config;
pub use index::{RangeIndex, SegmentInfo, SplitEntry};
pub use metadata::{MetadataCache, PyramidMetadata};
pub use raster::{PixelType, Raster, RasterBlock};
pub use stitch::{stitch, StitchInput, StitchedPartition};
pub use store::PyramidStore;
pub use tile::{tile_bounds, tile_id, Bounds, TileBounds, TileId, TileRange};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of TileVault
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
