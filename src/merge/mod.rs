//! Merge (Compaction)
//!
//! Rewrites the live records of sealed segments into one compacted
//! segment plus a hint file.
//!
//! ## Responsibilities
//! - Scan sealed segments oldest → newest
//! - Keep a record only if the index still points at exactly its location
//! - Drop tombstones, superseded and expired records
//! - Produce the relocations the engine applies when it installs the output
//!
//! ## Output
//! The compacted segment takes the id of the newest input. Every input is
//! older than the active segment, so recovery still folds it before any
//! write that happened after it. It is written as `{id}.archive` and
//! `{id}.hint.tmp` and only becomes live once the engine commits it.

mod commit;

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

pub use commit::{resume, MergeCommit, COMMIT_FILENAME};

use crate::error::{CornError, Result};
use crate::keydir::{KeyDir, KeyDirEntry};
use crate::pool::BufferPool;
use crate::record::{self, DataRecord, HintRecord};
use crate::segment::{self, RecordIter, Segment, SegmentId};

/// Summary of one compaction pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub input_segments: usize,
    pub records_scanned: u64,
    pub records_kept: u64,
    pub bytes_before: u64,
    pub bytes_after: u64,
    /// None when there was nothing to merge
    pub output_segment: Option<SegmentId>,
}

/// An index update produced by compaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
    pub key: Vec<u8>,
    pub from_segment: SegmentId,
    pub from_offset: u64,
    pub to: KeyDirEntry,
}

/// A live record dropped because its TTL elapsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expiry {
    pub key: Vec<u8>,
    pub segment: SegmentId,
    pub offset: u64,
}

/// Compaction output that has been written but not yet installed
pub struct CompactionOutput {
    pub segment_id: SegmentId,
    pub inputs: Vec<SegmentId>,
    pub relocations: Vec<Relocation>,
    pub expired: Vec<Expiry>,
    pub stats: MergeStats,
    data: Segment,
    hint: Segment,
}

/// Writes compacted segments
pub struct Compactor<'a> {
    dir: &'a Path,
    pool: &'a BufferPool,
}

impl<'a> Compactor<'a> {
    pub fn new(dir: &'a Path, pool: &'a BufferPool) -> Self {
        Self { dir, pool }
    }

    /// Compact `inputs` (sealed segments, oldest first) against the live index
    ///
    /// The index is only read-locked briefly per record, so readers and
    /// writers keep running while the scan is in progress.
    pub fn compact(&self, inputs: &[Arc<Segment>], keydir: &RwLock<KeyDir>) -> Result<CompactionOutput> {
        let segment_id = inputs
            .iter()
            .map(|s| s.id())
            .max()
            .ok_or_else(|| CornError::Config("compaction needs at least one sealed segment".to_string()))?;

        let archive = segment::archive_path(self.dir, segment_id);
        let hint_tmp = segment::hint_tmp_path(self.dir, segment_id);
        segment::remove_if_exists(&archive)?;
        segment::remove_if_exists(&hint_tmp)?;

        let mut output = CompactionOutput {
            segment_id,
            inputs: inputs.iter().map(|s| s.id()).collect(),
            relocations: Vec::new(),
            expired: Vec::new(),
            stats: MergeStats {
                input_segments: inputs.len(),
                output_segment: Some(segment_id),
                ..Default::default()
            },
            data: Segment::open(&archive, segment_id)?,
            hint: Segment::open(&hint_tmp, segment_id)?,
        };

        match self.write_live_records(inputs, keydir, &mut output) {
            Ok(()) => Ok(output),
            Err(e) => {
                if let Err(cleanup) = output.discard() {
                    warn!("Failed to discard partial merge output: {}", cleanup);
                }
                Err(e)
            }
        }
    }

    fn write_live_records(
        &self,
        inputs: &[Arc<Segment>],
        keydir: &RwLock<KeyDir>,
        output: &mut CompactionOutput,
    ) -> Result<()> {
        let now = record::now_millis();

        for input in inputs {
            output.stats.bytes_before += input.len();
            let mut iter = RecordIter::new(input, self.pool);

            while let Some(item) = iter.next() {
                let (offset, record) = match item {
                    Ok(item) => item,
                    Err(e) if e.is_corruption() => {
                        let at = iter.offset();
                        if let Some(next) = segment::resync(input, at)? {
                            return Err(CornError::CorruptRecord(format!(
                                "segment {} is corrupt at offset {} but has intact records from {}; merge aborted",
                                input.id(),
                                at,
                                next
                            )));
                        }
                        warn!(
                            "Segment {}: merge scan stopped at torn tail, offset {} ({})",
                            input.id(),
                            at,
                            e
                        );
                        break;
                    }
                    Err(e) => return Err(e),
                };
                output.stats.records_scanned += 1;

                if record.is_tombstone() {
                    continue;
                }

                let live = keydir
                    .read()
                    .get(&record.key)
                    .is_some_and(|e| e.points_at(input.id(), offset));
                if !live {
                    continue;
                }

                if record.is_expired_at(now) {
                    output.expired.push(Expiry {
                        key: record.key,
                        segment: input.id(),
                        offset,
                    });
                    continue;
                }

                output.keep(input.id(), offset, record)?;
            }
        }

        output.data.sync()?;
        output.hint.sync()?;
        output.stats.bytes_after = output.data.len();

        debug!(
            "Merge wrote segment {}: kept {} of {} records, {} → {} bytes",
            output.segment_id,
            output.stats.records_kept,
            output.stats.records_scanned,
            output.stats.bytes_before,
            output.stats.bytes_after
        );
        Ok(())
    }
}

impl CompactionOutput {
    fn keep(&mut self, from_segment: SegmentId, from_offset: u64, record: DataRecord) -> Result<()> {
        let bytes = record.encode();
        let (written, end) = self.data.append(&bytes)?;
        let offset = end - written as u64;

        let hint = HintRecord::new(offset, record.timestamp, record.key.clone());
        self.hint.append(&hint.encode())?;

        self.relocations.push(Relocation {
            to: KeyDirEntry::new(self.segment_id, offset, record.value.len() as u32, record.timestamp),
            key: record.key,
            from_segment,
            from_offset,
        });
        self.stats.records_kept += 1;
        Ok(())
    }

    /// Check that every index entry referring to an input segment is
    /// carried by this output. Anything else would be lost on install.
    pub fn verify_coverage(&self, keydir: &KeyDir) -> Result<()> {
        let inputs: HashSet<SegmentId> = self.inputs.iter().copied().collect();
        let covered: HashSet<(&[u8], SegmentId, u64)> = self
            .relocations
            .iter()
            .map(|r| (r.key.as_slice(), r.from_segment, r.from_offset))
            .chain(
                self.expired
                    .iter()
                    .map(|e| (e.key.as_slice(), e.segment, e.offset)),
            )
            .collect();

        for (key, entry) in keydir.iter() {
            if inputs.contains(&entry.segment_id)
                && !covered.contains(&(key.as_slice(), entry.segment_id, entry.offset))
            {
                return Err(CornError::CorruptRecord(format!(
                    "live record at segment {} offset {} is unreadable; merge aborted",
                    entry.segment_id, entry.offset
                )));
            }
        }
        Ok(())
    }

    /// Point the index at the compacted records; entries overwritten since
    /// the scan are left alone. Returns (relocated, expired) counts.
    pub fn apply(&self, keydir: &mut KeyDir) -> (usize, usize) {
        let relocated = self
            .relocations
            .iter()
            .filter(|r| keydir.relocate(&r.key, r.from_segment, r.from_offset, r.to))
            .count();
        let expired = self
            .expired
            .iter()
            .filter(|e| keydir.remove_if_at(&e.key, e.segment, e.offset))
            .count();
        (relocated, expired)
    }

    /// Close the output files ahead of promotion
    pub fn seal(&self) -> Result<()> {
        self.data.close()?;
        self.hint.close()
    }

    /// Commit marker describing this output
    pub fn commit(&self) -> MergeCommit {
        MergeCommit::new(self.segment_id, self.inputs.clone())
    }

    /// Delete the uninstalled output files
    pub fn discard(&self) -> Result<()> {
        self.data.close()?;
        self.hint.close()?;
        segment::remove_if_exists(self.data.path())?;
        segment::remove_if_exists(self.hint.path())
    }
}
