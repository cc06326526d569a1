//! Record Codec
//!
//! Binary layouts for everything CornKV writes to disk.
//!
//! ## Responsibilities
//! - Encode/decode Data Records (the unit of a segment file)
//! - Encode/decode Hint Records (value-free projection written by compaction)
//! - CRC32 checksums over every Data Record body
//! - Header-only decoding for two-phase reads (peek header, then read body)
//!
//! ## Data Record Format (big-endian)
//! ```text
//! ┌──────────┬───────────────┬──────────┬───────────┬───────────┬─────┬───────┐
//! │ CRC (4)  │ Timestamp (8) │ TTL (4)  │ KeyLen(4) │ ValLen(4) │ Key │ Value │
//! └──────────┴───────────────┴──────────┴───────────┴───────────┴─────┴───────┘
//!            └──────────────── covered by CRC ────────────────────────────────┘
//! ```
//! A zero `ValLen` marks a tombstone.
//!
//! ## Hint Record Format (big-endian)
//! ```text
//! ┌────────────┬───────────────┬───────────┬─────┐
//! │ Offset (8) │ Timestamp (8) │ KeyLen(4) │ Key │
//! └────────────┴───────────────┴───────────┴─────┘
//! ```

mod data;
mod hint;

use std::time::{SystemTime, UNIX_EPOCH};

pub use data::{DataRecord, RecordHeader, HEADER_SIZE};
pub use hint::{HintHeader, HintRecord, HINT_HEADER_SIZE};

/// Current wall-clock time in Unix milliseconds
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
