//! Segment Builder
//!
//! Writes tiles, in ascending tile-id order, to a new segment file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, VaultError};
use crate::tile::TileId;

use super::{Segment, ENTRY_HEADER_SIZE, HEADER_SIZE, MAGIC, VERSION};

/// Builder for creating a new segment from sorted tiles
pub struct SegmentBuilder {
    path: PathBuf,
    writer: BufWriter<File>,
    tile_count: u64,
    /// Current write position (for index)
    current_offset: u64,
    /// Index: tile id → file offset of entry
    index: Vec<(TileId, u64)>,
    /// Running CRC hasher for data section
    data_hasher: crc32fast::Hasher,
}

impl SegmentBuilder {
    /// Create a new segment builder
    ///
    /// Writes the header immediately; call `add()` in ascending tile-id order,
    /// then `finish()` to write index and footer.
    pub fn new(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut writer = BufWriter::new(file);

        // Tile count placeholder, patched in finish
        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&0u64.to_le_bytes())?;

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            tile_count: 0,
            current_offset: HEADER_SIZE,
            index: Vec::new(),
            data_hasher: crc32fast::Hasher::new(),
        })
    }

    /// Append one encoded raster
    ///
    /// Fails if `tile_id` is not strictly greater than the previous one.
    pub fn add(&mut self, tile_id: TileId, raster: &[u8]) -> Result<()> {
        if let Some(&(last, _)) = self.index.last() {
            if tile_id <= last {
                return Err(VaultError::Storage(format!(
                    "tiles must be added in ascending order: {} after {}",
                    tile_id, last
                )));
            }
        }

        let len = u32::try_from(raster.len()).map_err(|_| {
            VaultError::Storage(format!(
                "tile {} is too large for a segment entry: {} bytes",
                tile_id,
                raster.len()
            ))
        })?;

        self.index.push((tile_id, self.current_offset));

        let id_bytes = tile_id.to_le_bytes();
        let len_bytes = len.to_le_bytes();

        self.writer.write_all(&id_bytes)?;
        self.writer.write_all(&len_bytes)?;
        self.writer.write_all(raster)?;

        self.data_hasher.update(&id_bytes);
        self.data_hasher.update(&len_bytes);
        self.data_hasher.update(raster);

        self.current_offset += ENTRY_HEADER_SIZE + raster.len() as u64;
        self.tile_count += 1;

        Ok(())
    }

    /// Number of tiles added so far
    pub fn tile_count(&self) -> u64 {
        self.tile_count
    }

    /// Write index block and footer
    ///
    /// A segment must hold at least one tile.
    pub fn finish(mut self) -> Result<Segment> {
        let (min_tile, max_tile) = match (self.index.first(), self.index.last()) {
            (Some(&(min, _)), Some(&(max, _))) => (min, max),
            _ => {
                return Err(VaultError::Storage(format!(
                    "refusing to finish empty segment {}",
                    self.path.display()
                )))
            }
        };

        let index_offset = self.current_offset;

        for (tile_id, offset) in &self.index {
            self.writer.write_all(&tile_id.to_le_bytes())?;
            self.writer.write_all(&offset.to_le_bytes())?;
        }

        let data_crc = self.data_hasher.finalize();

        // Footer: index_offset (8) + data_crc (4) + padding (4)
        self.writer.write_all(&index_offset.to_le_bytes())?;
        self.writer.write_all(&data_crc.to_le_bytes())?;
        self.writer.write_all(&[0u8; 4])?;

        self.writer.flush()?;

        let mut file = self
            .writer
            .into_inner()
            .map_err(|e| VaultError::Storage(format!("Failed to flush segment: {}", e)))?;
        file.seek(SeekFrom::Start(6))?; // After magic + version
        file.write_all(&self.tile_count.to_le_bytes())?;
        file.sync_all()?;

        let file_size = file.metadata()?.len();

        Ok(Segment {
            path: self.path,
            tile_count: self.tile_count,
            min_tile,
            max_tile,
            file_size,
        })
    }
}
