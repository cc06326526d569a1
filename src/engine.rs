//! Engine Module
//!
//! The public facade that coordinates all components.
//!
//! ## Responsibilities
//! - Own the active segment, the sealed segments and the KeyDir
//! - Run recovery on open and compaction on demand
//! - Rotate the active segment when it grows past the size limit
//! - Serialize writers while letting readers proceed

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::{Config, SyncStrategy};
use crate::error::{CornError, Result};
use crate::keydir::{KeyDir, KeyDirEntry};
use crate::merge::{self, Compactor, MergeStats};
use crate::pool::BufferPool;
use crate::record::{DataRecord, HEADER_SIZE};
use crate::recovery::{RecoveredSegment, Recovery};
use crate::segment::{Segment, SegmentId};

/// The active segment plus every sealed one
struct SegmentSet {
    active: Arc<Segment>,
    sealed: BTreeMap<SegmentId, Arc<Segment>>,
}

impl SegmentSet {
    fn get(&self, id: SegmentId) -> Option<&Arc<Segment>> {
        if self.active.id() == id {
            Some(&self.active)
        } else {
            self.sealed.get(&id)
        }
    }

    fn all(&self) -> impl Iterator<Item = &Arc<Segment>> {
        self.sealed.values().chain(std::iter::once(&self.active))
    }
}

/// The main storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (put/delete/rotate/merge install): Serialized by `write_lock`
///   - Must acquire: write_lock → segments → keydir
///   - The appended record and its index entry are published together
///
/// - **Reads** (get/list): Never take `write_lock`
///   - `get` holds the segment-set read lock across the index lookup and
///     the record read, so a merge install is seen entirely or not at all
///
/// - **Merge**: scans sealed segments without blocking anyone, then
///   installs its output under the write locks
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Active + sealed segments
    segments: RwLock<SegmentSet>,

    /// In-memory index
    keydir: RwLock<KeyDir>,

    /// Serializes write operations
    write_lock: Mutex<()>,

    /// Allows one compaction at a time
    merge_lock: Mutex<()>,

    /// Next id for a new segment
    next_segment_id: AtomicU64,

    /// Writes appended since the last fsync
    unsynced_writes: AtomicUsize,

    /// Read buffers shared with recovery and compaction
    pool: BufferPool,
}

impl Engine {
    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Create the data directory
    /// 2. Finish or discard an interrupted merge
    /// 3. Fold every segment into the KeyDir, oldest first
    /// 4. Reuse the newest segment as active, or start a fresh one
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        let dir = config.data_dir.clone();

        // Step 1: Create data directory if it doesn't exist
        fs::create_dir_all(&dir).map_err(|source| CornError::Open {
            path: dir.clone(),
            source,
        })?;

        // Step 2: Complete or roll back a merge interrupted by a crash
        merge::resume(&dir)?;

        // Step 3: Rebuild the index
        let pool = BufferPool::new(config.buffer_pool_slots, config.read_buffer_size);
        let mut keydir = KeyDir::new();
        let mut recovered = Recovery::new(&mut keydir, &pool).recover_dir(&dir)?;

        let next_id = recovered.last().map_or(1, |r| r.segment.id() + 1);
        let next_segment_id = AtomicU64::new(next_id);

        // Step 4: Pick the active segment
        let reusable = recovered
            .last()
            .is_some_and(|r| Self::can_reuse_as_active(r, config.max_segment_size));
        let active = match recovered.pop() {
            Some(last) if reusable => {
                if last.result.was_truncated {
                    warn!(
                        "Truncating segment {} from {} to {} bytes",
                        last.segment.id(),
                        last.segment.len(),
                        last.result.valid_len
                    );
                    last.segment.truncate(last.result.valid_len)?;
                }
                last.segment
            }
            other => {
                recovered.extend(other);
                let id = next_segment_id.fetch_add(1, Ordering::SeqCst);
                Segment::create(&dir, id)?
            }
        };

        let sealed = recovered
            .into_iter()
            .map(|r| (r.segment.id(), Arc::new(r.segment)))
            .collect::<BTreeMap<_, _>>();

        info!(
            "Opened store at {:?}: {} keys, active segment {}, {} sealed",
            dir,
            keydir.len(),
            active.id(),
            sealed.len()
        );

        Ok(Self {
            config,
            segments: RwLock::new(SegmentSet {
                active: Arc::new(active),
                sealed,
            }),
            keydir: RwLock::new(keydir),
            write_lock: Mutex::new(()),
            merge_lock: Mutex::new(()),
            next_segment_id,
            unsynced_writes: AtomicUsize::new(0),
            pool,
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    /// Get a value by key
    ///
    /// Returns `Ok(None)` for absent or expired keys.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let segments = self.segments.read();

        let entry = match self.keydir.read().get(key) {
            Some(entry) => *entry,
            None => return Ok(None),
        };

        let segment = segments
            .get(entry.segment_id)
            .ok_or(CornError::SegmentNotFound(entry.segment_id))?;
        let record = self.read_record(segment, entry.offset)?;

        if record.key != key {
            return Err(CornError::CorruptRecord(format!(
                "segment {} offset {} holds a different key",
                entry.segment_id, entry.offset
            )));
        }
        if record.is_tombstone() || record.is_expired() {
            return Ok(None);
        }
        Ok(Some(record.value))
    }

    /// Put a key-value pair that never expires
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.put_with_ttl(key, value, 0)
    }

    /// Put a key-value pair that expires `ttl` seconds from now (0 = never)
    ///
    /// Steps:
    /// 1. Acquire write lock
    /// 2. Append the record to the active segment
    /// 3. Point the KeyDir at it
    /// 4. Sync / rotate as configured
    pub fn put_with_ttl(&self, key: &[u8], value: &[u8], ttl: u32) -> Result<()> {
        Self::validate_key(key)?;
        if value.is_empty() {
            return Err(CornError::EmptyValue);
        }
        if u32::try_from(value.len()).is_err() {
            return Err(CornError::ValueTooLarge(value.len()));
        }

        let _write_guard = self.write_lock.lock();

        let record = DataRecord::new(key.to_vec(), value.to_vec(), ttl);
        let timestamp = record.timestamp;
        let segments = self.segments.read();
        let (segment_id, offset) = Self::append(&segments.active, &record)?;

        self.keydir.write().insert(
            key.to_vec(),
            KeyDirEntry::new(segment_id, offset, value.len() as u32, timestamp),
        );

        self.after_write(segments)
    }

    /// Delete a key
    ///
    /// Fails with `KeyNotFound` when the key is not indexed. Otherwise a
    /// tombstone is appended and then the key leaves the KeyDir.
    ///
    /// A key whose TTL has run out stays indexed until the next merge, so
    /// deleting it succeeds and writes a tombstone even though `get`
    /// already returns `None` for it.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        let _write_guard = self.write_lock.lock();

        if !self.keydir.read().contains_key(key) {
            return Err(CornError::KeyNotFound);
        }

        let segments = self.segments.read();
        Self::append(&segments.active, &DataRecord::tombstone(key.to_vec()))?;
        self.keydir.write().remove(key);

        self.after_write(segments)
    }

    /// Snapshot of every indexed key (unordered)
    ///
    /// Expired keys are still indexed and therefore listed until a merge
    /// drops them. Expiry is only checked against the record on disk, so
    /// call `get` for a key's current visibility.
    pub fn list(&self) -> Vec<Vec<u8>> {
        self.keydir.read().keys()
    }

    /// Flush the active segment to stable storage
    pub fn sync(&self) -> Result<()> {
        self.segments.read().active.sync()?;
        self.unsynced_writes.store(0, Ordering::SeqCst);
        Ok(())
    }

    /// Seal the active segment and start a new one
    pub fn rotate(&self) -> Result<SegmentId> {
        let _write_guard = self.write_lock.lock();
        self.rotate_locked()
    }

    /// Compact every sealed segment into one segment + hint file
    pub fn merge(&self) -> Result<MergeStats> {
        let _merge_guard = self.merge_lock.lock();
        let dir = self.config.data_dir.as_path();

        let inputs: Vec<Arc<Segment>> = self.segments.read().sealed.values().cloned().collect();
        if inputs.is_empty() {
            debug!("Merge skipped: no sealed segments");
            return Ok(MergeStats::default());
        }

        let output = Compactor::new(dir, &self.pool).compact(&inputs, &self.keydir)?;
        drop(inputs);

        let _write_guard = self.write_lock.lock();
        let mut segments = self.segments.write();
        let mut keydir = self.keydir.write();

        if let Err(e) = output.verify_coverage(&keydir) {
            if let Err(cleanup) = output.discard() {
                warn!("Failed to discard merge output: {}", cleanup);
            }
            return Err(e);
        }

        // Commit point: after this the merge survives a crash
        output.seal()?;
        let commit = output.commit();
        commit.write(dir)?;
        commit.promote(dir)?;
        let merged = Arc::new(Segment::create(dir, commit.output)?);

        // Index first, then retire the old segments
        let (relocated, expired) = output.apply(&mut keydir);
        drop(keydir);

        for id in &commit.inputs {
            if let Some(old) = segments.sealed.remove(id) {
                if let Err(e) = old.close() {
                    warn!("Failed to close merged segment {}: {}", id, e);
                }
            }
        }
        segments.sealed.insert(commit.output, merged);
        commit.retire(dir)?;

        info!(
            "Merged {} segments into {}: {} keys relocated, {} expired, {} → {} bytes",
            output.stats.input_segments,
            commit.output,
            relocated,
            expired,
            output.stats.bytes_before,
            output.stats.bytes_after
        );

        Ok(output.stats.clone())
    }

    /// Run `merge` on a background thread
    pub fn spawn_merge(self: &Arc<Self>) -> JoinHandle<Result<MergeStats>> {
        let engine = Arc::clone(self);
        std::thread::spawn(move || engine.merge())
    }

    /// Sync and close every segment handle
    ///
    /// Every segment is attempted; the first error is returned.
    pub fn close(&self) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        let segments = self.segments.read();

        let mut first_err = None;
        for segment in segments.all() {
            if let Err(e) = segment.close() {
                warn!("Failed to close segment {}: {}", segment.id(), e);
                first_err.get_or_insert(e);
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.keydir.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keydir.read().is_empty()
    }

    /// Id of the segment currently accepting appends
    pub fn active_segment_id(&self) -> SegmentId {
        self.segments.read().active.id()
    }

    /// Ids of the sealed segments, oldest first
    pub fn sealed_segment_ids(&self) -> Vec<SegmentId> {
        self.segments.read().sealed.keys().copied().collect()
    }

    /// Active + sealed
    pub fn segment_count(&self) -> usize {
        self.segments.read().sealed.len() + 1
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn validate_key(key: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(CornError::InvalidKey("key must not be empty".to_string()));
        }
        if u32::try_from(key.len()).is_err() {
            return Err(CornError::InvalidKey(format!("key too long: {} bytes", key.len())));
        }
        Ok(())
    }

    /// Append a record; returns (segment id, record offset)
    fn append(active: &Segment, record: &DataRecord) -> Result<(SegmentId, u64)> {
        let bytes = record.encode();
        let (written, end) = active.append(&bytes)?;
        Ok((active.id(), end - written as u64))
    }

    /// Two-phase read: header first, then exactly the full record
    fn read_record(&self, segment: &Segment, offset: u64) -> Result<DataRecord> {
        let mut buf = self.pool.get();
        segment.read_into(offset, HEADER_SIZE, &mut buf)?;
        let header = DataRecord::decode_header(&buf)?;

        segment.read_into(offset, header.record_len(), &mut buf)?;
        DataRecord::decode(&buf)
    }

    /// Apply the sync strategy and rotate a full segment (write lock held)
    fn after_write(&self, segments: parking_lot::RwLockReadGuard<'_, SegmentSet>) -> Result<()> {
        let pending = self.unsynced_writes.fetch_add(1, Ordering::SeqCst) + 1;
        let should_sync = match self.config.sync_strategy {
            SyncStrategy::EveryWrite => true,
            SyncStrategy::EveryNWrites { count } => pending >= count,
            SyncStrategy::Manual => false,
        };
        if should_sync {
            segments.active.sync()?;
            self.unsynced_writes.store(0, Ordering::SeqCst);
        }

        let full = segments.active.len() >= self.config.max_segment_size;
        drop(segments);
        if full {
            self.rotate_locked()?;
        }
        Ok(())
    }

    /// Seal the active segment (write lock held)
    fn rotate_locked(&self) -> Result<SegmentId> {
        let mut segments = self.segments.write();
        segments.active.sync()?;
        self.unsynced_writes.store(0, Ordering::SeqCst);

        let id = self.next_segment_id.fetch_add(1, Ordering::SeqCst);
        let fresh = Arc::new(Segment::create(&self.config.data_dir, id)?);
        let sealed = std::mem::replace(&mut segments.active, fresh);

        debug!("Sealed segment {} ({} bytes), active is now {}", sealed.id(), sealed.len(), id);
        segments.sealed.insert(sealed.id(), sealed);
        Ok(id)
    }

    fn can_reuse_as_active(last: &RecoveredSegment, max_segment_size: u64) -> bool {
        !last.has_hint
            && !last.result.mid_segment_corruption
            && last.result.valid_len < max_segment_size
    }
}
