//! Recovery (Fold)
//!
//! Rebuilds the KeyDir from the segments on disk at startup.
//!
//! ## Algorithm
//! Segments are folded oldest → newest so later writes overwrite earlier
//! index entries. For each segment:
//! 1. If a hint file exists, fold the hints only (values are never read)
//! 2. Otherwise scan the data records; puts insert, tombstones remove
//! 3. A corrupt or torn record ends the scan of that segment; everything
//!    applied before it stays in the index

use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::keydir::{KeyDir, KeyDirEntry};
use crate::pool::BufferPool;
use crate::record::{DataRecord, HintRecord, RecordHeader, HEADER_SIZE};
use crate::segment::{self, HintIter, RecordIter, Segment, SegmentId};

/// Result of folding one segment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryResult {
    pub segment_id: SegmentId,

    /// Put records (or hints) inserted into the index
    pub records_applied: u64,

    /// Tombstones applied as removals
    pub tombstones_applied: u64,

    /// End of the last good record
    pub valid_len: u64,

    /// Whether the scan stopped before the end of the file
    pub was_truncated: bool,

    /// Whether decodable records follow the corruption (not a torn tail)
    pub mid_segment_corruption: bool,

    /// Whether the index was rebuilt from the hint file
    pub from_hint: bool,
}

impl RecoveryResult {
    fn new(segment_id: SegmentId) -> Self {
        Self {
            segment_id,
            ..Default::default()
        }
    }
}

/// A segment opened during recovery, with what its fold found
#[derive(Debug)]
pub struct RecoveredSegment {
    pub segment: Segment,
    pub result: RecoveryResult,
    pub has_hint: bool,
}

/// Folds segments into a KeyDir
pub struct Recovery<'a> {
    keydir: &'a mut KeyDir,
    pool: &'a BufferPool,
}

impl<'a> Recovery<'a> {
    pub fn new(keydir: &'a mut KeyDir, pool: &'a BufferPool) -> Self {
        Self { keydir, pool }
    }

    /// Open and fold every segment in `dir`, oldest first
    pub fn recover_dir(&mut self, dir: &Path) -> Result<Vec<RecoveredSegment>> {
        let mut recovered = Vec::new();

        for id in segment::discover(dir)? {
            let segment = Segment::create(dir, id)?;
            let hint = segment::hint_path(dir, id);
            let has_hint = hint.is_file();

            let result = if has_hint {
                self.fold_with_hint(&segment, &hint)?
            } else {
                self.fold_data(&segment)?
            };

            debug!(
                "Recovered segment {}: {} records, {} tombstones, from_hint={}",
                id, result.records_applied, result.tombstones_applied, result.from_hint
            );

            recovered.push(RecoveredSegment {
                segment,
                result,
                has_hint,
            });
        }

        if !recovered.is_empty() {
            info!(
                "Recovery complete: {} segments, {} live keys",
                recovered.len(),
                self.keydir.len()
            );
        }

        Ok(recovered)
    }

    /// Fold a segment by scanning its data records
    pub fn fold_data(&mut self, segment: &Segment) -> Result<RecoveryResult> {
        let mut result = RecoveryResult::new(segment.id());
        let mut iter = RecordIter::new(segment, self.pool);

        while let Some(item) = iter.next() {
            match item {
                Ok((offset, record)) => self.apply(segment.id(), offset, record, &mut result),
                Err(e) if e.is_corruption() => {
                    let at = iter.offset();
                    result.was_truncated = true;

                    if let Some(next) = segment::resync(segment, at)? {
                        result.mid_segment_corruption = true;
                        warn!(
                            "Segment {}: corrupt record at offset {} followed by valid data at {} ({})",
                            segment.id(),
                            at,
                            next,
                            e
                        );
                    } else {
                        warn!(
                            "Segment {}: torn tail at offset {} of {} ({})",
                            segment.id(),
                            at,
                            segment.len(),
                            e
                        );
                    }
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        result.valid_len = iter.offset();
        Ok(result)
    }

    /// Fold a segment from its hint file, falling back to the data scan
    /// when the hints do not describe the segment exactly
    pub fn fold_with_hint(&mut self, segment: &Segment, hint_path: &Path) -> Result<RecoveryResult> {
        let hint = Segment::open(hint_path, segment.id())?;
        let hints = Self::read_hints(&hint, self.pool);
        hint.close()?;

        let entries = match hints.and_then(|h| self.hint_entries(segment, h)) {
            Some(entries) => entries,
            None => {
                warn!(
                    "Segment {}: hint file does not match data, scanning data instead",
                    segment.id()
                );
                return self.fold_data(segment);
            }
        };

        let mut result = RecoveryResult::new(segment.id());
        result.from_hint = true;
        result.valid_len = segment.len();
        result.records_applied = entries.len() as u64;

        for (key, entry) in entries {
            self.keydir.insert(key, entry);
        }

        Ok(result)
    }

    /// Scan a segment without touching any live index
    pub fn verify(segment: &Segment, pool: &BufferPool) -> Result<RecoveryResult> {
        let mut scratch = KeyDir::new();
        Recovery::new(&mut scratch, pool).fold_data(segment)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn apply(&mut self, id: SegmentId, offset: u64, record: DataRecord, result: &mut RecoveryResult) {
        if record.is_tombstone() {
            self.keydir.remove(&record.key);
            result.tombstones_applied += 1;
        } else {
            let entry = KeyDirEntry::new(id, offset, record.value.len() as u32, record.timestamp);
            self.keydir.insert(record.key, entry);
            result.records_applied += 1;
        }
    }

    fn read_header(&self, segment: &Segment, offset: u64) -> Option<RecordHeader> {
        let mut buf = self.pool.get();
        segment.read_into(offset, HEADER_SIZE, &mut buf).ok()?;
        DataRecord::decode_header(&buf).ok()
    }

    fn read_hints(hint: &Segment, pool: &BufferPool) -> Option<Vec<HintRecord>> {
        HintIter::new(hint, pool).collect::<Result<Vec<_>>>().ok()
    }

    /// Turn hints into index entries, deriving each value size from the
    /// gap to the next record. Compacted segments hold exactly their
    /// hinted records, back to back, in hint order.
    fn hint_entries(&self, segment: &Segment, hints: Vec<HintRecord>) -> Option<Vec<(Vec<u8>, KeyDirEntry)>> {
        let data_len = segment.len();

        // The last hinted record must be the last record in the segment
        if let Some(last) = hints.last() {
            let header = self.read_header(segment, last.offset)?;
            if header.key_len as usize != last.key.len()
                || last.offset + header.record_len() as u64 != data_len
            {
                return None;
            }
        }

        let mut expected = 0u64;
        let mut entries = Vec::with_capacity(hints.len());

        for (i, hint) in hints.iter().enumerate() {
            if hint.offset != expected {
                return None;
            }
            let next = hints.get(i + 1).map_or(data_len, |h| h.offset);
            let record_len = next.checked_sub(hint.offset)?;
            let overhead = (HEADER_SIZE + hint.key.len()) as u64;
            if record_len <= overhead {
                return None;
            }
            let value_size = u32::try_from(record_len - overhead).ok()?;

            entries.push((
                hint.key.clone(),
                KeyDirEntry::new(segment.id(), hint.offset, value_size, hint.timestamp),
            ));
            expected = next;
        }

        (expected == data_len).then_some(entries)
    }
}
