//! # CornKV
//!
//! A Bitcask-style, log-structured key-value store with:
//! - Append-only segment files with CRC32-checked records
//! - An in-memory KeyDir: one seek-and-read per lookup
//! - Crash recovery by folding segments (or their hint files)
//! - Online compaction that rewrites live records into segment + hint pairs
//! - Single-writer/multi-reader concurrency model
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Engine                                │
//! │            (Single Writer / Multi Reader)                    │
//! └──────┬──────────────────┬──────────────────────┬────────────┘
//!        │                  │                      │
//!        ▼                  ▼                      ▼
//!  ┌───────────┐     ┌─────────────┐        ┌─────────────┐
//!  │  KeyDir   │     │  Segments   │        │    Merge    │
//!  │ (RwLock)  │     │ active +    │◄───────│ (Compactor) │
//!  └─────▲─────┘     │ sealed      │        └─────────────┘
//!        │           └──────┬──────┘
//!        │                  │
//!  ┌─────┴─────┐     ┌──────▼──────┐
//!  │ Recovery  │◄────│   Record    │
//!  │  (Fold)   │     │   Codec     │
//!  └───────────┘     └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod record;
pub mod segment;
pub mod keydir;
pub mod pool;
pub mod recovery;
pub mod merge;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{CornError, Result};
pub use config::{Config, SyncStrategy};
pub use engine::Engine;
pub use merge::MergeStats;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of CornKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
