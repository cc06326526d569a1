//! Configuration for CornKV
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{CornError, Result};

/// Main configuration for a CornKV store
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── 0000000001.data   (sealed segment)
    ///     ├── 0000000001.hint   (hint file, present after compaction)
    ///     ├── 0000000002.data   (active segment)
    ///     └── merge.commit      (only while a compaction is being installed)
    pub data_dir: PathBuf,

    /// Sync strategy: how often to fsync the active segment
    pub sync_strategy: SyncStrategy,

    /// Size in bytes at which the active segment is sealed and a new one started
    pub max_segment_size: u64,

    // -------------------------------------------------------------------------
    // Buffer Pool Configuration
    // -------------------------------------------------------------------------
    /// Number of read buffers kept for reuse
    pub buffer_pool_slots: usize,

    /// Initial capacity of each pooled read buffer (bytes)
    pub read_buffer_size: usize,
}

/// Segment sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N unsynced writes (balanced durability/performance)
    EveryNWrites { count: usize },

    /// Only fsync on explicit `sync()`, rotation and close
    Manual,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./cornkv_data"),
            sync_strategy: SyncStrategy::EveryNWrites { count: 100 },
            max_segment_size: 64 * 1024 * 1024, // 64 MB
            buffer_pool_slots: 64,
            read_buffer_size: 4 * 1024,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_segment_size == 0 {
            return Err(CornError::Config(
                "max_segment_size must be greater than 0".to_string(),
            ));
        }
        if self.buffer_pool_slots == 0 {
            return Err(CornError::Config(
                "buffer_pool_slots must be greater than 0".to_string(),
            ));
        }
        if let SyncStrategy::EveryNWrites { count: 0 } = self.sync_strategy {
            return Err(CornError::Config(
                "EveryNWrites count must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Set the segment rotation threshold (in bytes)
    pub fn max_segment_size(mut self, size: u64) -> Self {
        self.config.max_segment_size = size;
        self
    }

    /// Set the number of pooled read buffers
    pub fn buffer_pool_slots(mut self, slots: usize) -> Self {
        self.config.buffer_pool_slots = slots;
        self
    }

    /// Set the initial capacity of pooled read buffers (in bytes)
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.config.read_buffer_size = size;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
