//! Tile-id ranges
//!
//! Plain value types used by the split index and the stitcher.

use serde::{Deserialize, Serialize};

use super::TileId;

/// Inclusive tile-id range `[start, end]` (`start <= end`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileRange {
    pub start: TileId,
    pub end: TileId,
}

impl TileRange {
    pub const fn new(start: TileId, end: TileId) -> Self {
        Self { start, end }
    }

    /// Range holding exactly one tile
    pub const fn single(id: TileId) -> Self {
        Self { start: id, end: id }
    }

    pub fn contains(&self, id: TileId) -> bool {
        self.start <= id && id <= self.end
    }

    pub fn intersects(&self, other: &TileRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Overlapping part of two ranges, if any
    pub fn intersection(&self, other: &TileRange) -> Option<TileRange> {
        if !self.intersects(other) {
            return None;
        }
        Some(TileRange::new(
            self.start.max(other.start),
            self.end.min(other.end),
        ))
    }

    /// Number of tile ids in the range (saturates for the full u64 domain)
    pub fn tile_count(&self) -> u64 {
        (self.end - self.start).saturating_add(1)
    }

    /// Iterate every tile id in the range
    pub fn ids(&self) -> impl Iterator<Item = TileId> {
        self.start..=self.end
    }
}

/// Sorted, coalesced set of tile-id ranges with O(log n) membership
///
/// Adjacent and overlapping inputs are merged, so `ranges()` never holds two
/// ranges that touch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeSet {
    ranges: Vec<TileRange>,
}

impl RangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from ranges in any order
    pub fn from_ranges(ranges: impl IntoIterator<Item = TileRange>) -> Self {
        let mut sorted: Vec<TileRange> = ranges.into_iter().collect();
        sorted.sort_unstable();

        let mut merged: Vec<TileRange> = Vec::with_capacity(sorted.len());
        for range in sorted {
            match merged.last_mut() {
                Some(last) if range.start <= last.end.saturating_add(1) => {
                    last.end = last.end.max(range.end);
                }
                _ => merged.push(range),
            }
        }

        Self { ranges: merged }
    }

    /// Check whether `id` falls in any range
    pub fn contains(&self, id: TileId) -> bool {
        let idx = self.ranges.partition_point(|r| r.end < id);
        self.ranges.get(idx).map_or(false, |r| r.start <= id)
    }

    /// Check whether any tile of `range` is covered
    pub fn intersects(&self, range: &TileRange) -> bool {
        let idx = self.ranges.partition_point(|r| r.end < range.start);
        self.ranges
            .get(idx)
            .map_or(false, |r| r.start <= range.end)
    }

    /// Union of two sets
    pub fn union(&self, other: &RangeSet) -> RangeSet {
        RangeSet::from_ranges(self.ranges.iter().chain(other.ranges.iter()).copied())
    }

    /// Parts of `range` not covered by this set, in ascending order
    pub fn subtract_from(&self, range: &TileRange) -> Vec<TileRange> {
        let mut remaining = Vec::new();
        let mut cursor = range.start;

        let idx = self.ranges.partition_point(|r| r.end < range.start);
        for covered in &self.ranges[idx..] {
            if covered.start > range.end {
                break;
            }
            if covered.start > cursor {
                remaining.push(TileRange::new(cursor, covered.start - 1));
            }
            match covered.end.checked_add(1) {
                Some(next) => cursor = cursor.max(next),
                // Covered through the end of the id space
                None => return remaining,
            }
            if cursor > range.end {
                return remaining;
            }
        }

        remaining.push(TileRange::new(cursor, range.end));
        remaining
    }

    pub fn ranges(&self) -> &[TileRange] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Number of disjoint ranges
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Total number of tile ids covered
    pub fn tile_count(&self) -> u64 {
        self.ranges
            .iter()
            .fold(0u64, |acc, r| acc.saturating_add(r.tile_count()))
    }
}

impl FromIterator<TileRange> for RangeSet {
    fn from_iter<I: IntoIterator<Item = TileRange>>(iter: I) -> Self {
        RangeSet::from_ranges(iter)
    }
}
