//! Tile rows
//!
//! Row = `encode_key(tile_id)`, family = zoom, qualifier = tile id, value =
//! the encoded raster.

use crate::error::{Result, VaultError};
use crate::raster::RasterBlock;
use crate::tile::{tile_coords, TileId, TileRange};

use super::{decode_key, encode_key, Cell, KvStore};

fn tile_cell(zoom: u32, tile_id: TileId, raster: &RasterBlock, visibility: &str) -> Result<Cell> {
    tile_coords(zoom, tile_id)?;
    Ok(Cell::new(
        encode_key(tile_id).to_vec(),
        zoom.to_string(),
        tile_id.to_string(),
        visibility,
        raster.serialize(),
    ))
}

/// Store one tile
pub fn write_tile<S: KvStore + ?Sized>(
    store: &S,
    table: &str,
    zoom: u32,
    tile_id: TileId,
    raster: &RasterBlock,
    visibility: &str,
) -> Result<()> {
    store.apply(table, vec![tile_cell(zoom, tile_id, raster, visibility)?])
}

/// Store a batch of tiles atomically
pub fn write_tiles<S: KvStore + ?Sized>(
    store: &S,
    table: &str,
    zoom: u32,
    tiles: &[(TileId, RasterBlock)],
    visibility: &str,
) -> Result<()> {
    let cells = tiles
        .iter()
        .map(|(tile_id, raster)| tile_cell(zoom, *tile_id, raster, visibility))
        .collect::<Result<Vec<_>>>()?;
    store.apply(table, cells)
}

/// Fetch one tile, `Ok(None)` if absent
pub fn read_tile<S: KvStore + ?Sized>(
    store: &S,
    table: &str,
    zoom: u32,
    tile_id: TileId,
) -> Result<Option<RasterBlock>> {
    let key = encode_key(tile_id);
    let family = zoom.to_string();

    let cells = store.scan(table, &key, &key, Some(&family))?;
    cells
        .first()
        .map(|cell| RasterBlock::deserialize(&cell.value))
        .transpose()
}

/// All tiles at `zoom` whose ids fall in `range`, ascending
pub fn scan_tiles<S: KvStore + ?Sized>(
    store: &S,
    table: &str,
    zoom: u32,
    range: TileRange,
) -> Result<Vec<(TileId, RasterBlock)>> {
    let family = zoom.to_string();
    let cells = store.scan(
        table,
        &encode_key(range.start),
        &encode_key(range.end),
        Some(&family),
    )?;

    cells
        .iter()
        .filter(|cell| cell.row.len() == 8)
        .map(|cell| {
            let tile_id = decode_key(&cell.row);
            let raster = RasterBlock::deserialize(&cell.value).map_err(|e| match e {
                VaultError::CorruptRaster(msg) => {
                    VaultError::CorruptRaster(format!("tile {}: {}", tile_id, msg))
                }
                other => other,
            })?;
            Ok((tile_id, raster))
        })
        .collect()
}
