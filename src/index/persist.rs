//! Split index persistence
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header (10 bytes)                                       │
//! │   Magic: "TVSI" (4) | Version: u16 (2) | Count: u32 (4) │
//! ├─────────────────────────────────────────────────────────┤
//! │ Records (variable)                                      │
//! │   [Start: u64][End: u64][NameLen: u16][Name][Part: u32] │
//! │   ... repeated for each entry, ascending start ...      │
//! ├─────────────────────────────────────────────────────────┤
//! │ Footer (4 bytes)                                        │
//! │   RecordsCRC: u32                                       │
//! └─────────────────────────────────────────────────────────┘
//! ```
//! All integers little-endian.

use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::Path;

use crate::error::{Result, VaultError};

use super::{RangeIndex, SplitEntry};

/// Name of the split index file inside a level directory
pub const INDEX_FILENAME: &str = "splits.idx";

/// Magic bytes identifying a split index file
const MAGIC: &[u8; 4] = b"TVSI";

/// Current index format version
const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + Count (4) = 10 bytes
const HEADER_SIZE: usize = 10;

/// Footer size: CRC (4)
const FOOTER_SIZE: usize = 4;

/// Smallest record: Start (8) + End (8) + NameLen (2) + Part (4), empty name
const MIN_RECORD_SIZE: usize = 22;

impl RangeIndex {
    /// Write the index to `path`
    ///
    /// Writes to a sibling temp file and renames it over `path`, so readers
    /// see either the old index or the new one.
    pub fn persist(&self, path: &Path) -> Result<()> {
        let mut records = Vec::with_capacity(self.entries.len() * 32);
        for entry in &self.entries {
            let name_len = u16::try_from(entry.segment.len()).map_err(|_| {
                VaultError::Storage(format!(
                    "segment name too long for split index: {} bytes",
                    entry.segment.len()
                ))
            })?;

            records.extend_from_slice(&entry.start.to_le_bytes());
            records.extend_from_slice(&entry.end.to_le_bytes());
            records.extend_from_slice(&name_len.to_le_bytes());
            records.extend_from_slice(entry.segment.as_bytes());
            records.extend_from_slice(&entry.partition.to_le_bytes());
        }

        let count = u32::try_from(self.entries.len())
            .map_err(|_| VaultError::Storage("too many split entries".to_string()))?;
        let crc = crc32fast::hash(&records);

        let tmp_path = path.with_extension("idx.tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            writer.write_all(MAGIC)?;
            writer.write_all(&VERSION.to_le_bytes())?;
            writer.write_all(&count.to_le_bytes())?;
            writer.write_all(&records)?;
            writer.write_all(&crc.to_le_bytes())?;
            writer.flush()?;

            let file = writer
                .into_inner()
                .map_err(|e| VaultError::Storage(format!("Failed to flush split index: {}", e)))?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;

        tracing::debug!(path = %path.display(), entries = count, "Persisted split index");
        Ok(())
    }

    /// Read an index from `path`
    ///
    /// A missing or zero-length file yields an empty index. Anything else
    /// that does not parse is `CorruptIndex`.
    pub fn load(zoom: u32, path: &Path) -> Result<Self> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::empty(zoom)),
            Err(e) => return Err(e.into()),
        };

        if bytes.is_empty() {
            return Ok(Self::empty(zoom));
        }

        let entries = decode(&bytes)?;
        Self::validate(zoom, &entries)?;

        Ok(Self { zoom, entries })
    }
}

/// Parse a whole index file
fn decode(bytes: &[u8]) -> Result<Vec<SplitEntry>> {
    if bytes.len() < HEADER_SIZE + FOOTER_SIZE {
        return Err(VaultError::CorruptIndex(format!(
            "file too short: {} bytes",
            bytes.len()
        )));
    }

    let mut header = Cursor::new(&bytes[..HEADER_SIZE]);
    let magic = header.take(4)?;
    if magic != MAGIC {
        return Err(VaultError::CorruptIndex(format!(
            "invalid magic: expected TVSI, got {:?}",
            magic
        )));
    }
    let version = header.u16()?;
    if version != VERSION {
        return Err(VaultError::CorruptIndex(format!(
            "unsupported version: {}",
            version
        )));
    }
    let count = header.u32()?;

    let (records, footer) = bytes[HEADER_SIZE..].split_at(bytes.len() - HEADER_SIZE - FOOTER_SIZE);
    let stored_crc = Cursor::new(footer).u32()?;
    let actual_crc = crc32fast::hash(records);
    if stored_crc != actual_crc {
        return Err(VaultError::CorruptIndex(format!(
            "checksum mismatch: stored {:08x}, computed {:08x}",
            stored_crc, actual_crc
        )));
    }

    let mut cursor = Cursor::new(records);
    // The header is outside the checksum; never size anything from it alone
    let capacity = (count as usize).min(records.len() / MIN_RECORD_SIZE);
    let mut entries = Vec::with_capacity(capacity);
    for _ in 0..count {
        let start = cursor.u64()?;
        let end = cursor.u64()?;
        let name_len = cursor.u16()? as usize;
        let segment = std::str::from_utf8(cursor.take(name_len)?)
            .map_err(|e| VaultError::CorruptIndex(format!("segment name is not utf-8: {}", e)))?
            .to_string();
        let partition = cursor.u32()?;

        entries.push(SplitEntry {
            start,
            end,
            segment,
            partition,
        });
    }

    if !cursor.is_exhausted() {
        return Err(VaultError::CorruptIndex(format!(
            "{} trailing bytes after {} records",
            cursor.remaining(),
            count
        )));
    }

    Ok(entries)
}

/// Bounds-checked little-endian reader over a byte slice
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(VaultError::CorruptIndex(format!(
                "truncated record at offset {}: need {} bytes, have {}",
                self.pos,
                n,
                self.remaining()
            )));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u16(&mut self) -> Result<u16> {
        let mut raw = [0u8; 2];
        raw.copy_from_slice(self.take(2)?);
        Ok(u16::from_le_bytes(raw))
    }

    fn u32(&mut self) -> Result<u32> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(raw))
    }

    fn u64(&mut self) -> Result<u64> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(raw))
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }
}
