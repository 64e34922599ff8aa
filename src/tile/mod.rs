//! Tile Addressing Module
//!
//! Maps (zoom, column, row) to a single 64-bit tile id and back.
//!
//! ## Layout
//! ```text
//!   zoom z  →  2^z × 2^z grid
//!
//!   row 1 │ 2^z   2^z+1 ...
//!   row 0 │ 0     1     2 ...  2^z-1
//!         └──────────────────────────
//!           col 0 col 1 ...
//!
//!   tile_id = row * 2^z + col
//! ```
//!
//! Ids grow in row-major order, so comparing two ids at the same zoom is the
//! same as comparing their (row, col) pairs. Contiguous id ranges are therefore
//! horizontal strips of the grid, which is what keeps range partitioning
//! spatially coherent.

mod bounds;
mod range;

pub use bounds::{Bounds, TileBounds};
pub use range::{RangeSet, TileRange};

use crate::error::{Result, VaultError};

/// Tile identifier, unique within a (pyramid, zoom level)
pub type TileId = u64;

/// Largest supported zoom level (the full grid `4^31` still fits in a u64)
pub const MAX_ZOOM: u32 = 31;

/// Number of tiles along one side of the grid at `zoom`
pub fn grid_size(zoom: u32) -> Result<u64> {
    if zoom > MAX_ZOOM {
        return Err(VaultError::InvalidCoordinate {
            zoom,
            col: 0,
            row: 0,
        });
    }
    Ok(1u64 << zoom)
}

/// Compute the tile id of (col, row) at `zoom`
///
/// Fails with `InvalidCoordinate` if col/row are negative or `>= 2^zoom`.
pub fn tile_id(zoom: u32, col: i64, row: i64) -> Result<TileId> {
    let invalid = || VaultError::InvalidCoordinate { zoom, col, row };

    let side = grid_size(zoom).map_err(|_| invalid())?;
    if col < 0 || row < 0 || col as u64 >= side || row as u64 >= side {
        return Err(invalid());
    }

    Ok(((row as u64) << zoom) | col as u64)
}

/// Inverse of [`tile_id`]: returns (col, row)
pub fn tile_coords(zoom: u32, id: TileId) -> Result<(u64, u64)> {
    let side = grid_size(zoom)?;
    let col = id & (side - 1);
    let row = id >> zoom;

    if row >= side {
        return Err(VaultError::InvalidCoordinate {
            zoom,
            col: col as i64,
            row: i64::try_from(row).unwrap_or(i64::MAX),
        });
    }

    Ok((col, row))
}

/// (min, max) tile id of the full grid at `zoom`
pub fn tile_bounds(zoom: u32) -> Result<(TileId, TileId)> {
    let side = grid_size(zoom)?;
    Ok((0, side * side - 1))
}
