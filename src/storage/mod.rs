//! Storage Module
//!
//! File-tree storage for tile pyramids.
//!
//! ## Layout
//! ```text
//! {data_dir}/
//!   {pyramid}/
//!     metadata.bin           pyramid metadata blob
//!     {zoom}/
//!       part-00001.seg       sorted tiles (see `segment`)
//!       part-00002.seg
//!       splits.idx           split index over the segments
//! ```
//!
//! Segments at one level must cover disjoint tile-id ranges; the split index
//! generated from them rejects overlaps.

mod manager;
mod segment;

pub use manager::SegmentManager;
pub use segment::{Segment, SegmentBuilder, SegmentIterator, SegmentReader};
