//! Segment Manager
//!
//! Owns the segments of one pyramid at one zoom level.
//!
//! ## Responsibilities
//! - Discover existing segments on open
//! - Allocate the next segment id and write new segments
//! - Report each segment's tile-id extent for index generation
//! - Hand out shared readers

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;

use crate::error::Result;
use crate::index::SegmentInfo;
use crate::tile::TileId;

use super::{Segment, SegmentBuilder, SegmentReader};

/// Manages the segment files of one level directory
///
/// ## Concurrency:
/// - `segments`: Protected by RwLock (many concurrent readers, exclusive writer)
/// - `next_segment_id`: Atomic counter (lock-free)
/// - Readers lock their own file handle, so lookups only take the read lock
pub struct SegmentManager {
    level_dir: PathBuf,

    /// Open segment readers, ascending by segment id
    segments: RwLock<Vec<Arc<SegmentReader>>>,

    next_segment_id: AtomicU64,
}

impl SegmentManager {
    /// Open or create the level directory
    ///
    /// Discovers `part-NNNNN.seg` files and opens a reader for each.
    /// Leftover `part-NNNNN.seg.tmp` files from an interrupted write are
    /// deleted.
    pub fn open(level_dir: &Path) -> Result<Self> {
        fs::create_dir_all(level_dir)?;

        let mut segment_ids: Vec<u64> = Vec::new();
        for entry in fs::read_dir(level_dir)? {
            let entry = entry?;
            let file_path = entry.path();

            if !file_path.is_file() {
                continue;
            }
            if let Some(id) = Self::parse_segment_id(&file_path) {
                segment_ids.push(id);
            } else if Self::is_partial_segment(&file_path) {
                tracing::warn!(path = %file_path.display(), "Removing partially written segment");
                fs::remove_file(&file_path)?;
            }
        }
        segment_ids.sort_unstable();

        let mut segments = Vec::with_capacity(segment_ids.len());
        for id in &segment_ids {
            let reader = SegmentReader::open(&Self::segment_path_with_dir(level_dir, *id))?;
            segments.push(Arc::new(reader));
        }

        let next_id = segment_ids.last().map(|&id| id + 1).unwrap_or(1);

        tracing::debug!(
            dir = %level_dir.display(),
            segments = segments.len(),
            "Opened level directory"
        );

        Ok(Self {
            level_dir: level_dir.to_path_buf(),
            segments: RwLock::new(segments),
            next_segment_id: AtomicU64::new(next_id),
        })
    }

    /// Write `tiles` (ascending, distinct ids) as a new segment
    ///
    /// Returns `Ok(None)` for an empty batch; nothing is written. The file
    /// only appears under its final name once complete; on error nothing is
    /// left behind.
    pub fn write_segment(&self, tiles: &[(TileId, Bytes)]) -> Result<Option<Segment>> {
        if tiles.is_empty() {
            return Ok(None);
        }

        let id = self.next_segment_id.fetch_add(1, Ordering::SeqCst);
        let path = self.segment_path(id);
        let tmp_path = path.with_extension("seg.tmp");

        let (segment, reader) = match Self::build_segment(&tmp_path, &path, tiles) {
            Ok(built) => built,
            Err(e) => {
                let _ = fs::remove_file(&tmp_path);
                let _ = fs::remove_file(&path);
                return Err(e);
            }
        };
        self.segments.write().push(Arc::new(reader));

        tracing::info!(
            segment = %segment.name(),
            tiles = segment.tile_count,
            min_tile = segment.min_tile,
            max_tile = segment.max_tile,
            "Created segment"
        );

        Ok(Some(segment))
    }

    /// Name and tile-id extent of every segment, ascending by segment id
    pub fn segment_infos(&self) -> Vec<SegmentInfo> {
        self.segments.read().iter().map(|s| s.info()).collect()
    }

    /// Shared reader for the named segment
    pub fn reader(&self, name: &str) -> Option<Arc<SegmentReader>> {
        self.segments
            .read()
            .iter()
            .find(|s| s.name() == name)
            .cloned()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.read().len()
    }

    pub fn level_dir(&self) -> &Path {
        &self.level_dir
    }

    /// Next segment id (for testing/debugging)
    pub fn next_segment_id(&self) -> u64 {
        self.next_segment_id.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Build at `tmp_path`, then rename into place and open it
    fn build_segment(
        tmp_path: &Path,
        path: &Path,
        tiles: &[(TileId, Bytes)],
    ) -> Result<(Segment, SegmentReader)> {
        let mut builder = SegmentBuilder::new(tmp_path)?;
        for (tile_id, raster) in tiles {
            builder.add(*tile_id, raster)?;
        }
        let mut segment = builder.finish()?;

        fs::rename(tmp_path, path)?;
        segment.path = path.to_path_buf();

        let reader = SegmentReader::open(path)?;
        Ok((segment, reader))
    }

    fn segment_path(&self, id: u64) -> PathBuf {
        Self::segment_path_with_dir(&self.level_dir, id)
    }

    fn segment_path_with_dir(dir: &Path, id: u64) -> PathBuf {
        dir.join(format!("part-{:05}.seg", id))
    }

    /// Leftover of an interrupted `write_segment`: "part-00042.seg.tmp"
    fn is_partial_segment(path: &Path) -> bool {
        path.extension().map_or(false, |ext| ext == "tmp")
            && path
                .file_stem()
                .map_or(false, |stem| Self::parse_segment_id(Path::new(stem)).is_some())
    }

    /// "part-00042.seg" → Some(42)
    fn parse_segment_id(path: &Path) -> Option<u64> {
        if path.extension()? != "seg" {
            return None;
        }
        let name = path.file_stem()?.to_string_lossy();
        let id_str = name.strip_prefix("part-")?;
        id_str.parse().ok()
    }
}
