//! KeyDir Module
//!
//! In-memory index mapping every live key to its latest on-disk location.
//!
//! ## Responsibilities
//! - O(1) point lookups for the read path
//! - Last-writer-wins inserts (scan order at recovery, call order at runtime)
//! - Conditional relocation/removal used when compaction installs its output
//!
//! ## Data Structure Choice
//! A plain `HashMap`: iteration order is not significant and the engine
//! wraps the whole table in one `RwLock`, so no locking happens here.

mod table;

pub use table::KeyDir;

use crate::segment::SegmentId;

/// Location and metadata of the newest record for a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyDirEntry {
    /// Segment holding the record
    pub segment_id: SegmentId,
    /// Byte offset of the record start within the segment
    pub offset: u64,
    /// Length of the value payload
    pub value_size: u32,
    /// Write time (Unix milliseconds)
    pub timestamp: i64,
}

impl KeyDirEntry {
    pub fn new(segment_id: SegmentId, offset: u64, value_size: u32, timestamp: i64) -> Self {
        Self {
            segment_id,
            offset,
            value_size,
            timestamp,
        }
    }

    /// Whether this entry refers to the record at (`segment_id`, `offset`)
    pub fn points_at(&self, segment_id: SegmentId, offset: u64) -> bool {
        self.segment_id == segment_id && self.offset == offset
    }
}
