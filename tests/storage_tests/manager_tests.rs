//! Tests for SegmentManager
//!
//! These tests verify:
//! - Opening/creating level directories
//! - Writing segments and allocating segment ids
//! - Reporting segment extents for index generation
//! - Persistence (reopen and rediscover segments)

use bytes::Bytes;
use tilevault::index::{RangeIndex, SegmentInfo};
use tilevault::storage::SegmentManager;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn tiles(ids: std::ops::Range<u64>) -> Vec<(u64, Bytes)> {
    ids.map(|id| (id, Bytes::from(format!("tile-{}", id)))).collect()
}

// =============================================================================
// Open/Create Tests
// =============================================================================

#[test]
fn test_open_creates_directory() {
    let temp_dir = TempDir::new().unwrap();
    let level_dir = temp_dir.path().join("pyramid").join("8");

    let manager = SegmentManager::open(&level_dir).unwrap();

    assert!(level_dir.is_dir());
    assert_eq!(manager.segment_count(), 0);
    assert_eq!(manager.next_segment_id(), 1);
    assert!(manager.segment_infos().is_empty());
}

#[test]
fn test_open_ignores_other_files() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("splits.idx"), b"").unwrap();
    std::fs::write(temp_dir.path().join("notes.txt"), b"hello").unwrap();

    let manager = SegmentManager::open(temp_dir.path()).unwrap();
    assert_eq!(manager.segment_count(), 0);
}

// =============================================================================
// Write Tests
// =============================================================================

#[test]
fn test_write_segments() {
    let temp_dir = TempDir::new().unwrap();
    let manager = SegmentManager::open(temp_dir.path()).unwrap();

    let first = manager.write_segment(&tiles(0..10)).unwrap().unwrap();
    let second = manager.write_segment(&tiles(10..25)).unwrap().unwrap();

    assert_eq!(first.name(), "part-00001.seg");
    assert_eq!(second.name(), "part-00002.seg");
    assert_eq!(manager.segment_count(), 2);
    assert_eq!(
        manager.segment_infos(),
        vec![
            SegmentInfo::new("part-00001.seg", 0, 9),
            SegmentInfo::new("part-00002.seg", 10, 24),
        ]
    );

    let reader = manager.reader("part-00002.seg").unwrap();
    assert_eq!(reader.get(12).unwrap().unwrap(), Bytes::from("tile-12"));
    assert!(manager.reader("part-00099.seg").is_none());
}

#[test]
fn test_write_empty_batch() {
    let temp_dir = TempDir::new().unwrap();
    let manager = SegmentManager::open(temp_dir.path()).unwrap();

    assert!(manager.write_segment(&[]).unwrap().is_none());
    assert_eq!(manager.segment_count(), 0);
    assert_eq!(manager.next_segment_id(), 1);
}

#[test]
fn test_write_unsorted_batch_leaves_no_file() {
    let temp_dir = TempDir::new().unwrap();
    let manager = SegmentManager::open(temp_dir.path()).unwrap();

    let batch = vec![(5, Bytes::from("a")), (3, Bytes::from("b"))];
    assert!(manager.write_segment(&batch).is_err());
    assert_eq!(manager.segment_count(), 0);
    assert!(!temp_dir.path().join("part-00001.seg").exists());
    assert!(!temp_dir.path().join("part-00001.seg.tmp").exists());
}

#[test]
fn test_write_failing_after_finish_leaves_no_file() {
    let temp_dir = TempDir::new().unwrap();
    let manager = SegmentManager::open(temp_dir.path()).unwrap();

    // A directory squatting on the final name makes the rename fail
    std::fs::create_dir(temp_dir.path().join("part-00001.seg")).unwrap();

    assert!(manager.write_segment(&tiles(0..10)).is_err());
    assert_eq!(manager.segment_count(), 0);
    assert!(!temp_dir.path().join("part-00001.seg.tmp").exists());

    // The level is still usable
    let segment = manager.write_segment(&tiles(0..10)).unwrap().unwrap();
    assert_eq!(segment.name(), "part-00002.seg");
    assert!(segment.path.is_file());

    let reopened = SegmentManager::open(temp_dir.path()).unwrap();
    assert_eq!(reopened.segment_count(), 1);
}

#[test]
fn test_open_removes_partial_segment() {
    let temp_dir = TempDir::new().unwrap();
    {
        let manager = SegmentManager::open(temp_dir.path()).unwrap();
        manager.write_segment(&tiles(0..10)).unwrap();
    }

    // Interrupted write: header only, tile count still 0
    let partial = temp_dir.path().join("part-00002.seg.tmp");
    let mut header = b"TVSG".to_vec();
    header.extend_from_slice(&1u16.to_le_bytes());
    header.extend_from_slice(&0u64.to_le_bytes());
    std::fs::write(&partial, &header).unwrap();

    let manager = SegmentManager::open(temp_dir.path()).unwrap();
    assert_eq!(manager.segment_count(), 1);
    assert!(!partial.exists());

    let segment = manager.write_segment(&tiles(10..20)).unwrap().unwrap();
    assert_eq!(segment.name(), "part-00002.seg");
    assert_eq!(manager.segment_infos().len(), 2);
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[test]
fn test_reopen_discovers_segments() {
    let temp_dir = TempDir::new().unwrap();
    {
        let manager = SegmentManager::open(temp_dir.path()).unwrap();
        manager.write_segment(&tiles(100..110)).unwrap();
        manager.write_segment(&tiles(0..50)).unwrap();
    }

    let manager = SegmentManager::open(temp_dir.path()).unwrap();
    assert_eq!(manager.segment_count(), 2);
    assert_eq!(manager.next_segment_id(), 3);

    let index = RangeIndex::generate(8, manager.segment_infos()).unwrap();
    assert_eq!(index.lookup(105).unwrap().segment, "part-00001.seg");
    assert_eq!(index.lookup(7).unwrap().segment, "part-00002.seg");
    assert_eq!(index.lookup(7).unwrap().partition, 0);
}
