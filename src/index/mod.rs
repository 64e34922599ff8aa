//! Split Index Module
//!
//! Maps contiguous tile-id ranges to the physical segments that store them.
//!
//! ## Responsibilities
//! - Build a sorted, non-overlapping entry list from segment min/max ids
//! - O(log n) lookup of the segment holding a tile
//! - Persist/load the entry list (see `persist` for the file format)
//! - Crop the entry list to a tile rectangle
//!
//! ```text
//!   tile ids ──────────────────────────────────────────────▶
//!   ┌────────────────┬───────────────────┬─────────────────┐
//!   │ part-00001.seg │  part-00002.seg   │ part-00003.seg  │
//!   │   [0, 32]      │    [33, 70]       │   [71, 99]      │
//!   │ partition 0    │  partition 1      │ partition 2     │
//!   └────────────────┴───────────────────┴─────────────────┘
//! ```

mod persist;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};
use crate::tile::{tile_bounds, RangeSet, TileBounds, TileId, TileRange};

pub use persist::INDEX_FILENAME;

// =============================================================================
// Entries
// =============================================================================

/// One tile-id range and the segment that stores it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SplitEntry {
    /// First tile id (inclusive)
    pub start: TileId,
    /// Last tile id (inclusive)
    pub end: TileId,
    /// Segment name, relative to the level directory
    pub segment: String,
    /// Position of this entry in its index
    pub partition: u32,
}

impl SplitEntry {
    pub fn range(&self) -> TileRange {
        TileRange::new(self.start, self.end)
    }

    pub fn contains(&self, id: TileId) -> bool {
        self.start <= id && id <= self.end
    }
}

/// What a physical segment reports about itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentInfo {
    pub name: String,
    pub min_tile: TileId,
    pub max_tile: TileId,
}

impl SegmentInfo {
    pub fn new(name: impl Into<String>, min_tile: TileId, max_tile: TileId) -> Self {
        Self {
            name: name.into(),
            min_tile,
            max_tile,
        }
    }
}

// =============================================================================
// Range Index
// =============================================================================

/// Sorted split table for one pyramid at one zoom level
///
/// Immutable once built; safe to share across workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeIndex {
    zoom: u32,
    entries: Vec<SplitEntry>,
}

impl RangeIndex {
    /// An index with no entries
    pub fn empty(zoom: u32) -> Self {
        Self {
            zoom,
            entries: Vec::new(),
        }
    }

    /// Build the index from the segments of one level
    ///
    /// Segments may arrive in any order. Overlapping ranges mean the storage
    /// layer is corrupt and fail with `InconsistentSegments`.
    pub fn generate(zoom: u32, segments: impl IntoIterator<Item = SegmentInfo>) -> Result<Self> {
        let mut segments: Vec<SegmentInfo> = segments.into_iter().collect();
        segments.sort_by(|a, b| {
            (a.min_tile, a.max_tile, &a.name).cmp(&(b.min_tile, b.max_tile, &b.name))
        });

        let entries: Vec<SplitEntry> = segments
            .into_iter()
            .enumerate()
            .map(|(i, s)| SplitEntry {
                start: s.min_tile,
                end: s.max_tile,
                segment: s.name,
                partition: i as u32,
            })
            .collect();

        Self::validate(zoom, &entries)?;

        tracing::debug!(zoom, entries = entries.len(), "Generated split index");

        Ok(Self { zoom, entries })
    }

    /// Check that entries are well-formed, sorted, disjoint, and on the grid
    fn validate(zoom: u32, entries: &[SplitEntry]) -> Result<()> {
        let (_, max_id) = tile_bounds(zoom)?;

        for entry in entries {
            if entry.start > entry.end {
                return Err(VaultError::InconsistentSegments(format!(
                    "segment {} has inverted range [{}, {}]",
                    entry.segment, entry.start, entry.end
                )));
            }
            if entry.end > max_id {
                return Err(VaultError::InconsistentSegments(format!(
                    "segment {} reports tile {} beyond the zoom {} grid (max {})",
                    entry.segment, entry.end, zoom, max_id
                )));
            }
        }

        for pair in entries.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.start <= prev.end {
                return Err(VaultError::InconsistentSegments(format!(
                    "segments {} [{}, {}] and {} [{}, {}] overlap",
                    prev.segment, prev.start, prev.end, next.segment, next.start, next.end
                )));
            }
        }

        Ok(())
    }

    /// Find the entry whose range covers `id`
    pub fn lookup(&self, id: TileId) -> Result<&SplitEntry> {
        let idx = self.entries.partition_point(|e| e.end < id);
        self.entries
            .get(idx)
            .filter(|e| e.start <= id)
            .ok_or(VaultError::TileNotFound(id))
    }

    /// Entries intersecting a tile rectangle, in ascending tile-id order
    pub fn crop_to_bounds(&self, bounds: &TileBounds) -> Result<Vec<SplitEntry>> {
        if bounds.zoom != self.zoom {
            return Err(VaultError::ZoomMismatch {
                expected: self.zoom,
                actual: bounds.zoom,
            });
        }

        Ok(self
            .entries
            .iter()
            .filter(|e| bounds.intersects_range(&e.range()))
            .cloned()
            .collect())
    }

    /// Union of all entry ranges
    pub fn coverage(&self) -> RangeSet {
        self.entries.iter().map(SplitEntry::range).collect()
    }

    pub fn zoom(&self) -> u32 {
        self.zoom
    }

    pub fn entries(&self) -> &[SplitEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SplitEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a RangeIndex {
    type Item = &'a SplitEntry;
    type IntoIter = std::slice::Iter<'a, SplitEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
