//! Tests for split stitching
//!
//! These tests verify:
//! - Every covered tile is emitted exactly once, by the earliest input
//! - Prior/later bounds per input
//! - Cropping and its interaction with the emission rule
//! - Empty inputs, zoom mismatches and shadowed partitions
//! - Partitions survive serialization

use std::collections::HashMap;

use tilevault::index::{RangeIndex, SegmentInfo};
use tilevault::stitch::{stitch, StitchInput, StitchedPartition};
use tilevault::tile::{TileBounds, TileId, TileRange};
use tilevault::VaultError;

// =============================================================================
// Helper Functions
// =============================================================================

fn index(zoom: u32, ranges: &[(u64, u64)]) -> RangeIndex {
    let segments = ranges
        .iter()
        .enumerate()
        .map(|(i, &(min, max))| SegmentInfo::new(format!("part-{:05}.seg", i + 1), min, max));
    RangeIndex::generate(zoom, segments).unwrap()
}

/// tile id → (emitting input, emit count)
fn emissions(partitions: &[StitchedPartition]) -> HashMap<TileId, (usize, usize)> {
    let mut seen: HashMap<TileId, (usize, usize)> = HashMap::new();
    for partition in partitions {
        for tile in partition.emitted_tiles() {
            let slot = seen.entry(tile).or_insert((partition.input_index(), 0));
            slot.1 += 1;
        }
    }
    seen
}

// =============================================================================
// Emission Tests
// =============================================================================

#[test]
fn test_earliest_input_wins() {
    let inputs = vec![
        StitchInput::new("A", index(8, &[(0, 49), (50, 99)])),
        StitchInput::new("B", index(8, &[(50, 149)])),
    ];
    let partitions = stitch(&inputs, None).unwrap();
    assert_eq!(partitions.len(), 3);

    let seen = emissions(&partitions);
    assert_eq!(seen.len(), 150);
    for tile in 0..150 {
        let (input, count) = seen[&tile];
        assert_eq!(count, 1, "tile {} emitted {} times", tile, count);
        assert_eq!(input, if tile < 100 { 0 } else { 1 }, "tile {}", tile);
    }

    let b = &partitions[2];
    assert_eq!(b.input_name(), "B");
    assert_eq!(b.owned_ranges(), vec![TileRange::new(100, 149)]);
    assert!(!b.should_emit(75));
    assert!(b.should_emit(100));
}

#[test]
fn test_prior_and_later_bounds() {
    let inputs = vec![
        StitchInput::new("A", index(8, &[(0, 99)])),
        StitchInput::new("B", index(8, &[(50, 149)])),
        StitchInput::new("C", index(8, &[(140, 200)])),
    ];
    let partitions = stitch(&inputs, None).unwrap();

    assert!(partitions[0].prior_bounds().is_empty());
    assert_eq!(
        partitions[0].later_bounds().ranges(),
        &[TileRange::new(50, 200)]
    );

    assert_eq!(partitions[1].prior_bounds().ranges(), &[TileRange::new(0, 99)]);
    assert_eq!(
        partitions[1].later_bounds().ranges(),
        &[TileRange::new(140, 200)]
    );

    assert_eq!(partitions[2].prior_bounds().ranges(), &[TileRange::new(0, 149)]);
    assert!(partitions[2].later_bounds().is_empty());
    assert_eq!(partitions[2].owned_ranges(), vec![TileRange::new(150, 200)]);

    let seen = emissions(&partitions);
    assert_eq!(seen.len(), 201);
    assert!(seen.values().all(|&(_, count)| count == 1));
}

#[test]
fn test_fully_shadowed_partition() {
    let inputs = vec![
        StitchInput::new("A", index(8, &[(0, 99)])),
        StitchInput::new("B", index(8, &[(10, 20), (90, 120)])),
    ];
    let partitions = stitch(&inputs, None).unwrap();

    assert!(partitions[1].is_fully_shadowed());
    assert_eq!(partitions[1].emitted_tiles().count(), 0);
    assert!(!partitions[2].is_fully_shadowed());
    assert_eq!(partitions[2].emitted_tiles().collect::<Vec<_>>(), (100..=120).collect::<Vec<_>>());
}

#[test]
fn test_empty_input_contributes_nothing() {
    let inputs = vec![
        StitchInput::new("empty", RangeIndex::empty(8)),
        StitchInput::new("B", index(8, &[(0, 9)])),
    ];
    let partitions = stitch(&inputs, None).unwrap();

    assert_eq!(partitions.len(), 1);
    assert_eq!(partitions[0].input_index(), 1);
    assert!(partitions[0].prior_bounds().is_empty());
    assert_eq!(partitions[0].emitted_tiles().count(), 10);
}

#[test]
fn test_no_inputs() {
    assert!(stitch(&[], None).unwrap().is_empty());
}

#[test]
fn test_zoom_mismatch() {
    let inputs = vec![
        StitchInput::new("A", index(8, &[(0, 9)])),
        StitchInput::new("B", index(9, &[(0, 9)])),
    ];
    assert!(matches!(
        stitch(&inputs, None),
        Err(VaultError::ZoomMismatch { expected: 8, actual: 9 })
    ));

    let inputs = vec![StitchInput::new("A", index(8, &[(0, 9)]))];
    let crop = TileBounds::full(7).unwrap();
    assert!(matches!(
        stitch(&inputs, Some(&crop)),
        Err(VaultError::ZoomMismatch { .. })
    ));
}

// =============================================================================
// Crop Tests
// =============================================================================

#[test]
fn test_crop_limits_emission() {
    // 16x16 grid; crop cols 0..=3, rows 0..=1
    let crop = TileBounds::new(4, 0, 0, 3, 1).unwrap();
    let inputs = vec![
        StitchInput::new("A", index(4, &[(0, 255)])),
        StitchInput::new("B", index(4, &[(0, 15), (100, 120)])),
    ];
    let partitions = stitch(&inputs, Some(&crop)).unwrap();

    // B's second entry lies in rows 6..=7 and is cropped away
    assert_eq!(partitions.len(), 2);
    assert_eq!(partitions[0].crop(), Some(&crop));

    let emitted: Vec<TileId> = partitions[0].emitted_tiles().collect();
    assert_eq!(emitted, vec![0, 1, 2, 3, 16, 17, 18, 19]);
    assert!(partitions[0].should_emit(17));
    assert!(!partitions[0].should_emit(4));

    assert!(partitions[1].is_fully_shadowed());
}

#[test]
fn test_crop_uncovered_input_is_dropped() {
    let crop = TileBounds::new(4, 0, 0, 15, 0).unwrap();
    let inputs = vec![
        StitchInput::new("A", index(4, &[(200, 255)])),
        StitchInput::new("B", index(4, &[(0, 15)])),
    ];
    let partitions = stitch(&inputs, Some(&crop)).unwrap();

    assert_eq!(partitions.len(), 1);
    assert_eq!(partitions[0].input_name(), "B");
    assert!(partitions[0].prior_bounds().is_empty());
    assert_eq!(partitions[0].emitted_tiles().count(), 16);
}

// =============================================================================
// Serialization Tests
// =============================================================================

#[test]
fn test_partition_serializes() {
    let crop = TileBounds::new(8, 0, 0, 255, 0).unwrap();
    let inputs = vec![
        StitchInput::new("A", index(8, &[(0, 99)])),
        StitchInput::new("B", index(8, &[(50, 149)])),
    ];
    let partitions = stitch(&inputs, Some(&crop)).unwrap();

    let encoded = bincode::serialize(&partitions).unwrap();
    let decoded: Vec<StitchedPartition> = bincode::deserialize(&encoded).unwrap();
    assert_eq!(decoded, partitions);
    assert_eq!(decoded[1].zoom(), 8);
}
