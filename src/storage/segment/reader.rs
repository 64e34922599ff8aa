//! Segment Reader
//!
//! Opens segment files and serves O(log n) tile lookups via an in-memory
//! index. The file handle sits behind a mutex, so one reader can be shared by
//! many threads.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use parking_lot::Mutex;

use crate::error::{Result, VaultError};
use crate::index::SegmentInfo;
use crate::tile::{TileId, TileRange};

use super::iterator::SegmentIterator;
use super::{
    le_u32, le_u64, segment_name, ENTRY_HEADER_SIZE, FOOTER_SIZE, HEADER_SIZE, INDEX_ENTRY_SIZE,
    MAGIC, VERSION,
};

/// Reader for segment files
pub struct SegmentReader {
    path: PathBuf,
    name: String,
    file: Mutex<BufReader<File>>,
    /// Ascending (tile id, entry offset)
    index: Vec<(TileId, u64)>,
    /// Start of the index block, end of the data block
    index_offset: u64,
    data_crc: u32,
}

impl SegmentReader {
    /// Open a segment for reading
    ///
    /// Loads the whole index into memory. Fails with `Storage` if the file is
    /// not a well-formed, non-empty segment.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();

        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(VaultError::Storage(format!(
                "Segment {} too short: {} bytes",
                path.display(),
                file_size
            )));
        }

        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;

        if &header[0..4] != MAGIC {
            return Err(VaultError::Storage(format!(
                "Invalid segment magic: expected TVSG, got {:?}",
                &header[0..4]
            )));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(VaultError::Storage(format!(
                "Unsupported segment version: {}",
                version
            )));
        }

        let tile_count = le_u64(&header[6..14]);

        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;

        let index_offset = le_u64(&footer[0..8]);
        let data_crc = le_u32(&footer[8..12]);

        let index_end = file_size - FOOTER_SIZE;
        if index_offset < HEADER_SIZE || index_offset > index_end {
            return Err(VaultError::Storage(format!(
                "Segment index offset {} outside file of {} bytes",
                index_offset, file_size
            )));
        }

        let index_block_size = index_end - index_offset;
        let expected_size = tile_count.checked_mul(INDEX_ENTRY_SIZE).ok_or_else(|| {
            VaultError::Storage(format!(
                "Segment {} header claims an impossible tile count {}",
                path.display(),
                tile_count
            ))
        })?;
        if index_block_size != expected_size {
            return Err(VaultError::Storage(format!(
                "Segment index holds {} bytes, expected {} for {} tiles",
                index_block_size, expected_size, tile_count
            )));
        }
        if tile_count == 0 {
            return Err(VaultError::Storage(format!(
                "Segment {} holds no tiles",
                path.display()
            )));
        }

        file.seek(SeekFrom::Start(index_offset))?;
        let mut index_data = vec![0u8; index_block_size as usize];
        file.read_exact(&mut index_data)?;

        // Parse index entries: [tile_id(8)][offset(8)]
        let mut index = Vec::with_capacity(tile_count as usize);
        for record in index_data.chunks_exact(INDEX_ENTRY_SIZE as usize) {
            let tile_id = le_u64(&record[0..8]);
            let offset = le_u64(&record[8..16]);

            if let Some(&(prev, _)) = index.last() {
                if tile_id <= prev {
                    return Err(VaultError::Storage(format!(
                        "Segment index out of order: {} after {}",
                        tile_id, prev
                    )));
                }
            }
            let in_data_block = offset
                .checked_add(ENTRY_HEADER_SIZE)
                .map_or(false, |end| offset >= HEADER_SIZE && end <= index_offset);
            if !in_data_block {
                return Err(VaultError::Storage(format!(
                    "Segment entry offset {} outside data block",
                    offset
                )));
            }
            index.push((tile_id, offset));
        }

        file.seek(SeekFrom::Start(0))?;

        Ok(Self {
            path: path.to_path_buf(),
            name: segment_name(path),
            file: Mutex::new(BufReader::new(file)),
            index,
            index_offset,
            data_crc,
        })
    }

    /// Read one tile's encoded raster
    ///
    /// Returns `Ok(None)` if the segment does not hold `tile_id`.
    pub fn get(&self, tile_id: TileId) -> Result<Option<Bytes>> {
        let offset = match self.index.binary_search_by_key(&tile_id, |&(id, _)| id) {
            Ok(pos) => self.index[pos].1,
            Err(_) => return Ok(None),
        };

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;

        let mut header = [0u8; ENTRY_HEADER_SIZE as usize];
        file.read_exact(&mut header)?;

        let stored_id = le_u64(&header[0..8]);
        if stored_id != tile_id {
            return Err(VaultError::Storage(format!(
                "Segment {} index points tile {} at an entry for tile {}",
                self.name, tile_id, stored_id
            )));
        }

        let len = le_u32(&header[8..12]);
        check_entry_len(&self.name, tile_id, offset, len, self.index_offset)?;

        let mut raster = vec![0u8; len as usize];
        file.read_exact(&mut raster)?;

        Ok(Some(Bytes::from(raster)))
    }

    /// Check whether the segment holds `tile_id` (index only, no I/O)
    pub fn contains(&self, tile_id: TileId) -> bool {
        self.index
            .binary_search_by_key(&tile_id, |&(id, _)| id)
            .is_ok()
    }

    /// Iterate tiles whose ids fall in `range`, ascending
    ///
    /// Holds the file lock until the iterator is dropped.
    pub fn iter_range(&self, range: TileRange) -> Result<SegmentIterator<'_>> {
        let first = self.index.partition_point(|&(id, _)| id < range.start);
        let start_offset = self
            .index
            .get(first)
            .map_or(self.index_offset, |&(_, offset)| offset);

        SegmentIterator::new(
            self.file.lock(),
            &self.name,
            start_offset,
            self.index_offset,
            range.end,
        )
    }

    /// Iterate every tile, ascending
    pub fn iter(&self) -> Result<SegmentIterator<'_>> {
        self.iter_range(TileRange::new(self.min_tile(), self.max_tile()))
    }

    /// Recompute the data block checksum and compare it to the footer
    pub fn verify(&self) -> Result<()> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(HEADER_SIZE))?;

        let mut hasher = crc32fast::Hasher::new();
        let mut remaining = self.index_offset - HEADER_SIZE;
        let mut buf = vec![0u8; 64 * 1024];
        while remaining > 0 {
            let n = remaining.min(buf.len() as u64) as usize;
            file.read_exact(&mut buf[..n])?;
            hasher.update(&buf[..n]);
            remaining -= n as u64;
        }

        let actual = hasher.finalize();
        if actual != self.data_crc {
            return Err(VaultError::Storage(format!(
                "Segment {} checksum mismatch: stored {:08x}, computed {:08x}",
                self.name, self.data_crc, actual
            )));
        }
        Ok(())
    }

    pub fn min_tile(&self) -> TileId {
        self.index.first().map_or(0, |&(id, _)| id)
    }

    pub fn max_tile(&self) -> TileId {
        self.index.last().map_or(0, |&(id, _)| id)
    }

    pub fn tile_count(&self) -> u64 {
        self.index.len() as u64
    }

    /// Name and tile-id extent, as consumed by `RangeIndex::generate`
    pub fn info(&self) -> SegmentInfo {
        SegmentInfo::new(self.name.clone(), self.min_tile(), self.max_tile())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Reject an entry whose raster would run past the data block
pub(super) fn check_entry_len(
    segment: &str,
    tile_id: TileId,
    offset: u64,
    len: u32,
    index_offset: u64,
) -> Result<()> {
    let fits = offset
        .checked_add(ENTRY_HEADER_SIZE + u64::from(len))
        .map_or(false, |end| end <= index_offset);
    if !fits {
        return Err(VaultError::Storage(format!(
            "Segment {} entry for tile {} at offset {} claims {} bytes past the data block",
            segment, tile_id, offset, len
        )));
    }
    Ok(())
}
