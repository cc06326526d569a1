//! Segment Iterators
//!
//! Sequential two-phase scans (header, then full record) over a segment.

use crate::error::{CornError, Result};
use crate::pool::BufferPool;
use crate::record::{DataRecord, HintRecord, HEADER_SIZE, HINT_HEADER_SIZE};

use super::Segment;

/// Iterator over the Data Records of a segment, yielding `(offset, record)`
///
/// Stops cleanly at the end of the segment. The first decode or I/O error
/// is yielded once and ends the scan; `offset()` then still points at the
/// start of the failed record, i.e. the end of the last good one.
pub struct RecordIter<'a> {
    segment: &'a Segment,
    pool: &'a BufferPool,
    offset: u64,
    done: bool,
}

impl<'a> RecordIter<'a> {
    pub fn new(segment: &'a Segment, pool: &'a BufferPool) -> Self {
        Self::starting_at(segment, pool, 0)
    }

    pub fn starting_at(segment: &'a Segment, pool: &'a BufferPool, offset: u64) -> Self {
        Self {
            segment,
            pool,
            offset,
            done: false,
        }
    }

    /// End of the last successfully decoded record
    pub fn offset(&self) -> u64 {
        self.offset
    }

    fn read_next(&mut self) -> Result<(u64, DataRecord)> {
        let mut buf = self.pool.get();

        self.segment.read_into(self.offset, HEADER_SIZE, &mut buf)?;
        let header = DataRecord::decode_header(&buf)?;

        let record_len = header.record_len();
        self.segment.read_into(self.offset, record_len, &mut buf)?;
        let record = DataRecord::decode(&buf)?;

        let offset = self.offset;
        self.offset += record_len as u64;
        Ok((offset, record))
    }
}

impl Iterator for RecordIter<'_> {
    type Item = Result<(u64, DataRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.read_next() {
            Ok(item) => Some(Ok(item)),
            Err(CornError::EndOfSegment { .. }) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Find the first record that decodes cleanly after a bad one at `bad_offset`
///
/// The bad record's length fields may be the corrupted bytes, so every
/// offset past it is tried rather than jumping by its declared length.
/// Returns `None` when nothing but garbage follows (a torn tail).
pub fn resync(segment: &Segment, bad_offset: u64) -> Result<Option<u64>> {
    let start = bad_offset + 1;
    let end = segment.len();
    if start + HEADER_SIZE as u64 > end {
        return Ok(None);
    }

    let rest = segment.read_at(start, (end - start) as usize)?;
    for i in 0..=rest.len() - HEADER_SIZE {
        let candidate = &rest[i..];
        let Ok(header) = DataRecord::decode_header(candidate) else {
            continue;
        };
        // Keys are never empty
        if header.key_len == 0 || header.record_len() > candidate.len() {
            continue;
        }
        if DataRecord::decode(candidate).is_ok() {
            return Ok(Some(start + i as u64));
        }
    }
    Ok(None)
}

/// Iterator over the Hint Records of a hint file
pub struct HintIter<'a> {
    hint: &'a Segment,
    pool: &'a BufferPool,
    offset: u64,
    done: bool,
}

impl<'a> HintIter<'a> {
    pub fn new(hint: &'a Segment, pool: &'a BufferPool) -> Self {
        Self {
            hint,
            pool,
            offset: 0,
            done: false,
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    fn read_next(&mut self) -> Result<HintRecord> {
        let mut buf = self.pool.get();

        self.hint.read_into(self.offset, HINT_HEADER_SIZE, &mut buf)?;
        let header = HintRecord::decode_header(&buf)?;

        let record_len = header.record_len();
        self.hint.read_into(self.offset, record_len, &mut buf)?;
        let hint = HintRecord::decode(&buf)?;

        self.offset += record_len as u64;
        Ok(hint)
    }
}

impl Iterator for HintIter<'_> {
    type Item = Result<HintRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.read_next() {
            Ok(hint) => Some(Ok(hint)),
            Err(CornError::EndOfSegment { .. }) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
