//! Tests for Segment files
//!
//! These tests verify:
//! - Append returns the written length and the new end offset
//! - Positional reads, including short reads at the end of the file
//! - EndOfSegment at or past the end
//! - Reopen picks up the existing length
//! - sync/close idempotence and errors after close
//! - Segment naming and discovery

use std::fs;

use cornkv::pool::BufferPool;
use cornkv::record::DataRecord;
use cornkv::segment::{self, RecordIter, Segment};
use cornkv::CornError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_segment() -> (TempDir, Segment) {
    let temp_dir = TempDir::new().unwrap();
    let segment = Segment::create(temp_dir.path(), 1).unwrap();
    (temp_dir, segment)
}

// =============================================================================
// Append / Read Tests
// =============================================================================

#[test]
fn test_create_makes_named_file() {
    let (temp, segment) = setup_temp_segment();

    assert!(temp.path().join("0000000001.data").is_file());
    assert_eq!(segment.id(), 1);
    assert!(segment.is_empty());
}

#[test]
fn test_append_returns_written_and_end() {
    let (_temp, segment) = setup_temp_segment();

    assert_eq!(segment.append(b"hello").unwrap(), (5, 5));
    assert_eq!(segment.append(b"world").unwrap(), (5, 10));
    assert_eq!(segment.len(), 10);
}

#[test]
fn test_read_at() {
    let (_temp, segment) = setup_temp_segment();
    segment.append(b"hello").unwrap();
    segment.append(b"world").unwrap();

    assert_eq!(segment.read_at(0, 5).unwrap(), b"hello");
    assert_eq!(segment.read_at(5, 5).unwrap(), b"world");
    assert_eq!(segment.read_at(3, 4).unwrap(), b"lowo");
}

#[test]
fn test_short_read_at_end() {
    let (_temp, segment) = setup_temp_segment();
    segment.append(b"helloworld").unwrap();

    assert_eq!(segment.read_at(8, 100).unwrap(), b"ld");
}

#[test]
fn test_read_past_end() {
    let (_temp, segment) = setup_temp_segment();
    segment.append(b"hello").unwrap();

    assert!(matches!(
        segment.read_at(5, 1),
        Err(CornError::EndOfSegment { segment: 1, offset: 5 })
    ));
    assert!(matches!(
        segment.read_at(100, 1),
        Err(CornError::EndOfSegment { .. })
    ));
}

#[test]
fn test_read_into_reuses_buffer() {
    let (_temp, segment) = setup_temp_segment();
    segment.append(b"abcdef").unwrap();
    let mut buf = b"leftover junk".to_vec();

    segment.read_into(2, 3, &mut buf).unwrap();

    assert_eq!(buf, b"cde");
}

#[test]
fn test_reopen_keeps_length() {
    let (temp, segment) = setup_temp_segment();
    segment.append(b"persisted").unwrap();
    segment.close().unwrap();

    let reopened = Segment::create(temp.path(), 1).unwrap();

    assert_eq!(reopened.len(), 9);
    assert_eq!(reopened.read_at(0, 9).unwrap(), b"persisted");

    reopened.append(b"!").unwrap();
    assert_eq!(reopened.read_at(0, 10).unwrap(), b"persisted!");
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_sync_and_close_are_idempotent() {
    let (_temp, segment) = setup_temp_segment();
    segment.append(b"data").unwrap();

    segment.sync().unwrap();
    segment.sync().unwrap();
    segment.close().unwrap();
    segment.close().unwrap();
    segment.sync().unwrap();

    assert!(segment.is_closed());
}

#[test]
fn test_operations_after_close() {
    let (_temp, segment) = setup_temp_segment();
    segment.append(b"data").unwrap();
    segment.close().unwrap();

    assert!(matches!(segment.append(b"more"), Err(CornError::SegmentClosed(1))));
    assert!(matches!(segment.read_at(0, 4), Err(CornError::SegmentClosed(1))));
}

// =============================================================================
// Record Iteration Tests
// =============================================================================

#[test]
fn test_record_iter_yields_offsets() {
    let (_temp, segment) = setup_temp_segment();
    let first = DataRecord::new(b"a".to_vec(), b"1".to_vec(), 0);
    let second = DataRecord::tombstone(b"a".to_vec());
    segment.append(&first.encode()).unwrap();
    segment.append(&second.encode()).unwrap();
    let pool = BufferPool::new(2, 64);

    let items: Vec<_> = RecordIter::new(&segment, &pool)
        .collect::<cornkv::Result<_>>()
        .unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0], (0, first.clone()));
    assert_eq!(items[1], (first.encoded_len() as u64, second));
}

#[test]
fn test_record_iter_stops_on_torn_tail() {
    let (_temp, segment) = setup_temp_segment();
    let record = DataRecord::new(b"key".to_vec(), b"value".to_vec(), 0);
    let bytes = record.encode();
    segment.append(&bytes).unwrap();
    segment.append(&bytes[..10]).unwrap();
    let pool = BufferPool::new(2, 64);

    let mut iter = RecordIter::new(&segment, &pool);

    assert!(iter.next().unwrap().is_ok());
    assert!(iter.next().unwrap().unwrap_err().is_corruption());
    assert!(iter.next().is_none());
    assert_eq!(iter.offset(), bytes.len() as u64);
}

// =============================================================================
// Naming / Discovery Tests
// =============================================================================

#[test]
fn test_paths() {
    let dir = std::path::Path::new("/data");

    assert_eq!(segment::data_path(dir, 42), dir.join("0000000042.data"));
    assert_eq!(segment::hint_path(dir, 42), dir.join("0000000042.hint"));
    assert_eq!(segment::archive_path(dir, 42), dir.join("0000000042.archive"));
    assert_eq!(segment::hint_tmp_path(dir, 42), dir.join("0000000042.hint.tmp"));
}

#[test]
fn test_parse_data_id() {
    let dir = std::path::Path::new("/data");

    assert_eq!(segment::parse_data_id(&dir.join("0000000007.data")), Some(7));
    assert_eq!(segment::parse_data_id(&dir.join("0000000007.hint")), None);
    assert_eq!(segment::parse_data_id(&dir.join("merge.commit")), None);
    assert_eq!(segment::parse_data_id(&dir.join("notanumber.data")), None);
}

#[test]
fn test_discover_sorts_ids() {
    let temp = TempDir::new().unwrap();
    for id in [10, 2, 7] {
        fs::write(segment::data_path(temp.path(), id), b"").unwrap();
    }
    fs::write(segment::hint_path(temp.path(), 7), b"").unwrap();
    fs::write(temp.path().join("README"), b"ignored").unwrap();

    assert_eq!(segment::discover(temp.path()).unwrap(), vec![2, 7, 10]);
}

#[test]
fn test_discover_missing_dir() {
    let temp = TempDir::new().unwrap();

    let result = segment::discover(&temp.path().join("nope"));

    assert!(matches!(result, Err(CornError::Open { .. })));
}
