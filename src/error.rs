//! Error types for TileVault
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

use crate::tile::TileId;

/// Result type alias using VaultError
pub type Result<T> = std::result::Result<T, VaultError>;

/// Unified error type for TileVault operations
#[derive(Debug, Error)]
pub enum VaultError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Addressing Errors
    // -------------------------------------------------------------------------
    #[error("Invalid tile coordinate: zoom={zoom} col={col} row={row}")]
    InvalidCoordinate { zoom: u32, col: i64, row: i64 },

    #[error("Zoom level mismatch: expected {expected}, got {actual}")]
    ZoomMismatch { expected: u32, actual: u32 },

    #[error("Invalid bounds: {0}")]
    InvalidBounds(String),

    // -------------------------------------------------------------------------
    // Raster Errors
    // -------------------------------------------------------------------------
    #[error(
        "Raster too large: width={width} height={height} bands={bands} \
         ({bytes_per_pixel} bytes per pixel, {total_bytes} total bytes)"
    )]
    RasterTooLarge {
        width: u32,
        height: u32,
        bands: u32,
        bytes_per_pixel: usize,
        total_bytes: u128,
    },

    #[error("Pixel out of range: x={x} y={y} band={band} (raster is {width}x{height}x{bands})")]
    PixelOutOfRange {
        x: u32,
        y: u32,
        band: u32,
        width: u32,
        height: u32,
        bands: u32,
    },

    #[error("Corrupt raster: {0}")]
    CorruptRaster(String),

    // -------------------------------------------------------------------------
    // Split Index Errors
    // -------------------------------------------------------------------------
    #[error("Inconsistent segments: {0}")]
    InconsistentSegments(String),

    #[error("Tile not found: {0}")]
    TileNotFound(TileId),

    #[error("Corrupt split index: {0}")]
    CorruptIndex(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    // -------------------------------------------------------------------------
    // Key-Value Backend Errors
    // -------------------------------------------------------------------------
    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    // -------------------------------------------------------------------------
    // Metadata / Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Corrupt metadata blob: {0}")]
    CorruptMetadataBlob(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
