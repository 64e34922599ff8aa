//! Split Stitcher Module
//!
//! Turns several overlapping pyramids at one zoom into a flat list of work
//! partitions such that every tile covered by any input is read exactly once.
//!
//! ## Emission Rule
//! ```text
//!   input 0 (A): ├──────── 0..=99 ────────┤
//!   input 1 (B):              ├──────── 50..=149 ────────┤
//!
//!   A partitions emit 0..=99       (prior bounds: none)
//!   B partitions emit 100..=149    (prior bounds: A's 0..=99)
//! ```
//! A partition emits tile `t` iff `t` is in its own entry range, inside the
//! crop rectangle (if any), and not covered by any earlier input. The earliest
//! input always wins a contested tile.
//!
//! Partitions are plain immutable values; they serialize, so a scheduler can
//! ship them to workers as-is.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};
use crate::index::{RangeIndex, SplitEntry};
use crate::tile::{RangeSet, TileBounds, TileId, TileRange};

// =============================================================================
// Inputs
// =============================================================================

/// One pyramid taking part in a stitched job
#[derive(Debug, Clone)]
pub struct StitchInput {
    pub name: String,
    pub index: RangeIndex,
}

impl StitchInput {
    pub fn new(name: impl Into<String>, index: RangeIndex) -> Self {
        Self {
            name: name.into(),
            index,
        }
    }
}

// =============================================================================
// Stitched Partition
// =============================================================================

/// One unit of work: a split of one input plus what it must leave to others
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StitchedPartition {
    zoom: u32,
    input_index: usize,
    input_name: String,
    entry: SplitEntry,
    crop: Option<TileBounds>,
    prior_bounds: RangeSet,
    later_bounds: RangeSet,
}

impl StitchedPartition {
    pub fn zoom(&self) -> u32 {
        self.zoom
    }

    /// Ordinal of the input this partition reads from
    pub fn input_index(&self) -> usize {
        self.input_index
    }

    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    pub fn entry(&self) -> &SplitEntry {
        &self.entry
    }

    pub fn crop(&self) -> Option<&TileBounds> {
        self.crop.as_ref()
    }

    /// Coverage of all earlier inputs; these tiles are never emitted here
    pub fn prior_bounds(&self) -> &RangeSet {
        &self.prior_bounds
    }

    /// Coverage of all later inputs (informational)
    pub fn later_bounds(&self) -> &RangeSet {
        &self.later_bounds
    }

    /// Decide whether this partition owns tile `t`
    pub fn should_emit(&self, t: TileId) -> bool {
        self.entry.contains(t)
            && self.crop.as_ref().map_or(true, |c| c.contains_tile_id(t))
            && !self.prior_bounds.contains(t)
    }

    /// Id ranges this partition owns, ascending
    ///
    /// The entry range minus prior coverage, further clipped to the crop
    /// rectangle when one is set.
    pub fn owned_ranges(&self) -> Vec<TileRange> {
        let unshadowed = self.prior_bounds.subtract_from(&self.entry.range());
        match &self.crop {
            Some(crop) => unshadowed
                .iter()
                .flat_map(|r| crop.clip_range(r))
                .collect(),
            None => unshadowed,
        }
    }

    /// Every tile id this partition emits, ascending
    pub fn emitted_tiles(&self) -> impl Iterator<Item = TileId> {
        self.owned_ranges().into_iter().flat_map(|r| r.ids())
    }

    /// True when earlier inputs (or the crop) leave nothing to emit
    pub fn is_fully_shadowed(&self) -> bool {
        self.owned_ranges().is_empty()
    }
}

// =============================================================================
// Stitching
// =============================================================================

/// Build the partition list for `inputs`, in input order then entry order
///
/// All inputs, and the crop when given, must share one zoom level. Inputs
/// whose cropped index is empty contribute no partitions and no coverage.
pub fn stitch(inputs: &[StitchInput], crop: Option<&TileBounds>) -> Result<Vec<StitchedPartition>> {
    let Some(first) = inputs.first() else {
        return Ok(Vec::new());
    };
    let zoom = first.index.zoom();

    for input in inputs {
        if input.index.zoom() != zoom {
            return Err(VaultError::ZoomMismatch {
                expected: zoom,
                actual: input.index.zoom(),
            });
        }
    }
    if let Some(crop) = crop {
        if crop.zoom != zoom {
            return Err(VaultError::ZoomMismatch {
                expected: zoom,
                actual: crop.zoom,
            });
        }
    }

    let cropped: Vec<Vec<SplitEntry>> = inputs
        .iter()
        .map(|input| match crop {
            Some(crop) => input.index.crop_to_bounds(crop),
            None => Ok(input.index.entries().to_vec()),
        })
        .collect::<Result<_>>()?;

    let coverage: Vec<RangeSet> = cropped
        .iter()
        .map(|entries| entries.iter().map(SplitEntry::range).collect())
        .collect();

    // prior[i] = union of coverage[0..i], later[i] = union of coverage[i+1..]
    let mut prior = Vec::with_capacity(inputs.len());
    let mut acc = RangeSet::new();
    for cov in &coverage {
        prior.push(acc.clone());
        acc = acc.union(cov);
    }

    let mut later = vec![RangeSet::new(); inputs.len()];
    let mut acc = RangeSet::new();
    for (i, cov) in coverage.iter().enumerate().rev() {
        later[i] = acc.clone();
        acc = acc.union(cov);
    }

    let mut partitions = Vec::new();
    for (i, (input, entries)) in inputs.iter().zip(cropped).enumerate() {
        for entry in entries {
            partitions.push(StitchedPartition {
                zoom,
                input_index: i,
                input_name: input.name.clone(),
                entry,
                crop: crop.copied(),
                prior_bounds: prior[i].clone(),
                later_bounds: later[i].clone(),
            });
        }
    }

    tracing::debug!(
        zoom,
        inputs = inputs.len(),
        partitions = partitions.len(),
        "Stitched split indexes"
    );

    Ok(partitions)
}
