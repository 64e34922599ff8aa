//! Segment Iterator
//!
//! Sequential iteration over a run of tiles in a segment.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};

use bytes::Bytes;
use parking_lot::MutexGuard;

use crate::error::Result;
use crate::tile::TileId;

use super::reader::check_entry_len;
use super::{le_u32, le_u64, ENTRY_HEADER_SIZE};

/// Iterator over segment tiles in ascending tile-id order
pub struct SegmentIterator<'a> {
    file: MutexGuard<'a, BufReader<File>>,
    segment: &'a str,
    /// Stop at this offset (start of index block)
    end_offset: u64,
    current_offset: u64,
    /// Stop after this tile id
    last_tile: TileId,
    done: bool,
}

impl<'a> SegmentIterator<'a> {
    pub(super) fn new(
        mut file: MutexGuard<'a, BufReader<File>>,
        segment: &'a str,
        start_offset: u64,
        end_offset: u64,
        last_tile: TileId,
    ) -> Result<Self> {
        file.seek(SeekFrom::Start(start_offset))?;
        Ok(Self {
            file,
            segment,
            end_offset,
            current_offset: start_offset,
            last_tile,
            done: false,
        })
    }

    fn read_entry(&mut self) -> Result<(TileId, Bytes)> {
        let mut header = [0u8; ENTRY_HEADER_SIZE as usize];
        self.file.read_exact(&mut header)?;

        let tile_id = le_u64(&header[0..8]);
        let len = le_u32(&header[8..12]);
        check_entry_len(self.segment, tile_id, self.current_offset, len, self.end_offset)?;

        let mut raster = vec![0u8; len as usize];
        self.file.read_exact(&mut raster)?;

        self.current_offset += ENTRY_HEADER_SIZE + u64::from(len);
        Ok((tile_id, Bytes::from(raster)))
    }
}

impl<'a> Iterator for SegmentIterator<'a> {
    /// (tile id, encoded raster)
    type Item = Result<(TileId, Bytes)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.current_offset >= self.end_offset {
            return None;
        }

        match self.read_entry() {
            Ok((tile_id, _)) if tile_id > self.last_tile => {
                self.done = true;
                None
            }
            Ok(entry) => Some(Ok(entry)),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
