//! Error types for CornKV
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;

use thiserror::Error;

use crate::segment::SegmentId;

/// Result type alias using CornError
pub type Result<T> = std::result::Result<T, CornError>;

/// Unified error type for CornKV operations
#[derive(Debug, Error)]
pub enum CornError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to open store at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // -------------------------------------------------------------------------
    // Record Errors
    // -------------------------------------------------------------------------
    #[error("Invalid header: need {expected} bytes, got {actual}")]
    InvalidHeader { expected: usize, actual: usize },

    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    // -------------------------------------------------------------------------
    // Segment Errors
    // -------------------------------------------------------------------------
    #[error("End of segment {segment} at offset {offset}")]
    EndOfSegment { segment: SegmentId, offset: u64 },

    #[error("Segment {0} is closed")]
    SegmentClosed(SegmentId),

    #[error("Segment {0} not found")]
    SegmentNotFound(SegmentId),

    // -------------------------------------------------------------------------
    // Key/Value Errors
    // -------------------------------------------------------------------------
    #[error("Key not found")]
    KeyNotFound,

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Value must not be empty (an empty value marks a deletion)")]
    EmptyValue,

    #[error("Value too large: {0} bytes")]
    ValueTooLarge(usize),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CornError {
    /// True for the errors a segment scan treats as "no more usable data"
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            CornError::InvalidHeader { .. } | CornError::CorruptRecord(_)
        )
    }
}
