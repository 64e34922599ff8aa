//! Tests for segment files
//!
//! These tests verify:
//! - Segment creation and writing
//! - O(log n) tile lookups via in-memory index
//! - Range iteration
//! - Checksum verification
//! - File format validation

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use tilevault::raster::{PixelType, RasterBlock};
use tilevault::storage::{Segment, SegmentBuilder, SegmentReader};
use tilevault::tile::TileRange;
use tilevault::VaultError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_segment() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("part-00001.seg");
    (temp_dir, path)
}

/// 2x2 single-band byte raster filled with `value`
fn tile_bytes(value: u8) -> Vec<u8> {
    let mut raster = RasterBlock::create_empty(2, 2, 1, PixelType::Byte).unwrap();
    raster.fill(value);
    raster.serialize().to_vec()
}

/// Segment holding tiles 10, 20, ..., count*10
fn create_segment(path: &PathBuf, count: u64) -> Segment {
    let mut builder = SegmentBuilder::new(path).unwrap();
    for i in 1..=count {
        builder.add(i * 10, &tile_bytes(i as u8)).unwrap();
    }
    builder.finish().unwrap()
}

// =============================================================================
// Builder Tests
// =============================================================================

#[test]
fn test_builder_creates_file() {
    let (_temp, path) = setup_temp_segment();

    let segment = create_segment(&path, 5);

    assert!(path.exists());
    assert_eq!(segment.tile_count, 5);
    assert_eq!(segment.min_tile, 10);
    assert_eq!(segment.max_tile, 50);
    assert_eq!(segment.name(), "part-00001.seg");
    assert_eq!(segment.file_size, fs::metadata(&path).unwrap().len());
}

#[test]
fn test_builder_rejects_unsorted() {
    let (_temp, path) = setup_temp_segment();

    let mut builder = SegmentBuilder::new(&path).unwrap();
    builder.add(20, &tile_bytes(1)).unwrap();
    assert!(builder.add(20, &tile_bytes(2)).is_err());
    assert!(builder.add(5, &tile_bytes(3)).is_err());
    assert_eq!(builder.tile_count(), 1);
}

#[test]
fn test_builder_rejects_empty() {
    let (_temp, path) = setup_temp_segment();

    let builder = SegmentBuilder::new(&path).unwrap();
    assert!(builder.finish().is_err());
}

// =============================================================================
// Reader Tests
// =============================================================================

#[test]
fn test_reader_get() {
    let (_temp, path) = setup_temp_segment();
    create_segment(&path, 5);

    let reader = SegmentReader::open(&path).unwrap();
    assert_eq!(reader.tile_count(), 5);

    let bytes = reader.get(30).unwrap().unwrap();
    assert_eq!(bytes.as_ref(), tile_bytes(3).as_slice());

    let raster = RasterBlock::deserialize(&bytes).unwrap();
    assert_eq!(raster.get_pixel::<u8>(1, 1, 0).unwrap(), 3);

    assert!(reader.get(35).unwrap().is_none());
    assert!(reader.get(0).unwrap().is_none());
    assert!(reader.contains(50));
    assert!(!reader.contains(51));
}

#[test]
fn test_reader_reports_extent() {
    let (_temp, path) = setup_temp_segment();
    let segment = create_segment(&path, 3);

    let reader = SegmentReader::open(&path).unwrap();
    assert_eq!(reader.min_tile(), 10);
    assert_eq!(reader.max_tile(), 30);
    assert_eq!(reader.info(), segment.info());
    assert_eq!(reader.name(), "part-00001.seg");
}

#[test]
fn test_reader_iter_range() {
    let (_temp, path) = setup_temp_segment();
    create_segment(&path, 5);
    let reader = SegmentReader::open(&path).unwrap();

    let ids: Vec<u64> = reader
        .iter_range(TileRange::new(15, 40))
        .unwrap()
        .map(|r| r.unwrap().0)
        .collect();
    assert_eq!(ids, vec![20, 30, 40]);

    let all: Vec<u64> = reader.iter().unwrap().map(|r| r.unwrap().0).collect();
    assert_eq!(all, vec![10, 20, 30, 40, 50]);

    assert_eq!(reader.iter_range(TileRange::new(51, 90)).unwrap().count(), 0);
    assert_eq!(reader.iter_range(TileRange::new(0, 9)).unwrap().count(), 0);

    // Lookups still work after iterating
    assert!(reader.get(10).unwrap().is_some());
}

#[test]
fn test_reader_shared_across_threads() {
    let (_temp, path) = setup_temp_segment();
    create_segment(&path, 20);
    let reader = Arc::new(SegmentReader::open(&path).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let reader = Arc::clone(&reader);
            thread::spawn(move || {
                for i in 1..=20u64 {
                    let id = ((i + t) % 20 + 1) * 10;
                    let bytes = reader.get(id).unwrap().unwrap();
                    assert_eq!(bytes.as_ref(), tile_bytes((id / 10) as u8).as_slice());
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_verify_detects_corruption() {
    let (_temp, path) = setup_temp_segment();
    create_segment(&path, 3);

    SegmentReader::open(&path).unwrap().verify().unwrap();

    // Flip a pixel byte of the first tile: header 14 + entry header 12 + raster header 16
    let mut bytes = fs::read(&path).unwrap();
    bytes[14 + 12 + 16] ^= 0xFF;
    fs::write(&path, &bytes).unwrap();

    let reader = SegmentReader::open(&path).unwrap();
    assert!(reader.verify().is_err());
}

#[test]
fn test_open_rejects_bad_files() {
    let (_temp, path) = setup_temp_segment();

    fs::write(&path, b"XXXX").unwrap();
    assert!(SegmentReader::open(&path).is_err());

    fs::write(&path, vec![0u8; 64]).unwrap();
    assert!(SegmentReader::open(&path).is_err());

    create_segment(&path, 2);
    let mut bytes = fs::read(&path).unwrap();
    bytes[0..4].copy_from_slice(b"ATKV");
    fs::write(&path, &bytes).unwrap();
    assert!(SegmentReader::open(&path).is_err());
}

#[test]
fn test_open_rejects_oversized_tile_count() {
    let (_temp, path) = setup_temp_segment();
    create_segment(&path, 1);

    let mut bytes = fs::read(&path).unwrap();
    bytes[6..14].copy_from_slice(&(u64::MAX / 2).to_le_bytes());
    fs::write(&path, &bytes).unwrap();

    assert!(matches!(
        SegmentReader::open(&path),
        Err(VaultError::Storage(_))
    ));
}

#[test]
fn test_open_rejects_offset_near_overflow() {
    let (_temp, path) = setup_temp_segment();
    create_segment(&path, 1);

    // Single index record sits right before the 16-byte footer
    let mut bytes = fs::read(&path).unwrap();
    let record = bytes.len() - 16 - 16;
    bytes[record + 8..record + 16].copy_from_slice(&(u64::MAX - 4).to_le_bytes());
    fs::write(&path, &bytes).unwrap();

    assert!(matches!(
        SegmentReader::open(&path),
        Err(VaultError::Storage(_))
    ));
}

#[test]
fn test_oversized_entry_length_is_an_error() {
    let (_temp, path) = setup_temp_segment();
    create_segment(&path, 2);

    // Len field of the first entry: header 14 + tile id 8
    let mut bytes = fs::read(&path).unwrap();
    bytes[22..26].copy_from_slice(&u32::MAX.to_le_bytes());
    fs::write(&path, &bytes).unwrap();

    let reader = SegmentReader::open(&path).unwrap();
    assert!(matches!(reader.get(10), Err(VaultError::Storage(_))));

    let first = reader.iter().unwrap().next().unwrap();
    assert!(matches!(first, Err(VaultError::Storage(_))));

    // The intact second entry is still served by lookup
    assert!(reader.get(20).unwrap().is_some());
}
