//! Tests for Data Record encoding and decoding
//!
//! These tests verify:
//! - Round-trip encoding for puts and tombstones
//! - Exact big-endian byte layout
//! - CRC32 corruption detection on every byte
//! - Header-only decoding and its failure modes
//! - TTL expiry checks

use cornkv::record::{DataRecord, HEADER_SIZE};
use cornkv::CornError;

// =============================================================================
// Helper Functions
// =============================================================================

fn sample_record() -> DataRecord {
    DataRecord::with_timestamp(b"wang".to_vec(), b"zhen".to_vec(), 0, 1_700_000_000_000)
}

// =============================================================================
// Round-Trip Tests
// =============================================================================

#[test]
fn test_encode_decode_put() {
    let record = sample_record();

    let bytes = record.encode();
    let decoded = DataRecord::decode(&bytes).unwrap();

    assert_eq!(record, decoded);
    assert!(!decoded.is_tombstone());
}

#[test]
fn test_encode_decode_tombstone() {
    let record = DataRecord::tombstone(b"gone".to_vec());

    let decoded = DataRecord::decode(&record.encode()).unwrap();

    assert!(decoded.is_tombstone());
    assert_eq!(decoded.key, b"gone");
    assert!(decoded.value.is_empty());
}

#[test]
fn test_encode_decode_with_ttl_and_binary_data() {
    let record = DataRecord::with_timestamp(vec![0, 255, 10], vec![0u8; 4096], 3600, -5);

    let decoded = DataRecord::decode(&record.encode()).unwrap();

    assert_eq!(decoded, record);
    assert_eq!(decoded.ttl, 3600);
    assert_eq!(decoded.timestamp, -5);
}

#[test]
fn test_decode_ignores_trailing_bytes() {
    let record = sample_record();
    let mut bytes = record.encode();
    bytes.extend_from_slice(b"next record starts here");

    assert_eq!(DataRecord::decode(&bytes).unwrap(), record);
}

// =============================================================================
// Layout Tests
// =============================================================================

#[test]
fn test_encoded_length() {
    let record = sample_record();
    let bytes = record.encode();

    assert_eq!(HEADER_SIZE, 24);
    assert_eq!(bytes.len(), HEADER_SIZE + 4 + 4);
    assert_eq!(record.encoded_len(), bytes.len());
}

#[test]
fn test_big_endian_layout() {
    let record = DataRecord::with_timestamp(b"ab".to_vec(), b"xyz".to_vec(), 7, 0x0102030405060708);
    let bytes = record.encode();

    assert_eq!(&bytes[4..12], &[1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(&bytes[12..16], &[0, 0, 0, 7]);
    assert_eq!(&bytes[16..20], &[0, 0, 0, 2]);
    assert_eq!(&bytes[20..24], &[0, 0, 0, 3]);
    assert_eq!(&bytes[24..26], b"ab");
    assert_eq!(&bytes[26..29], b"xyz");
}

#[test]
fn test_checksum_covers_everything_after_it() {
    let bytes = sample_record().encode();

    let stored = u32::from_be_bytes(bytes[0..4].try_into().unwrap());
    assert_eq!(stored, crc32fast::hash(&bytes[4..]));
}

// =============================================================================
// Corruption Detection Tests
// =============================================================================

#[test]
fn test_any_flipped_byte_is_detected() {
    let bytes = sample_record().encode();

    for i in 0..bytes.len() {
        let mut corrupted = bytes.clone();
        corrupted[i] ^= 0xFF;

        let result = DataRecord::decode(&corrupted);
        assert!(
            matches!(result, Err(CornError::CorruptRecord(_))),
            "flipping byte {} was not detected: {:?}",
            i,
            result
        );
    }
}

#[test]
fn test_truncated_body_is_corrupt() {
    let bytes = sample_record().encode();

    let result = DataRecord::decode(&bytes[..bytes.len() - 1]);

    assert!(matches!(result, Err(CornError::CorruptRecord(_))));
}

#[test]
fn test_short_buffer_is_invalid_header() {
    let bytes = sample_record().encode();

    let result = DataRecord::decode(&bytes[..HEADER_SIZE - 1]);

    assert!(matches!(
        result,
        Err(CornError::InvalidHeader { expected: 24, actual: 23 })
    ));
}

// =============================================================================
// Header Decoding Tests
// =============================================================================

#[test]
fn test_decode_header_only() {
    let record = DataRecord::with_timestamp(b"key".to_vec(), b"value".to_vec(), 9, 42);
    let bytes = record.encode();

    let header = DataRecord::decode_header(&bytes[..HEADER_SIZE]).unwrap();

    assert_eq!(header.timestamp, 42);
    assert_eq!(header.ttl, 9);
    assert_eq!(header.key_len, 3);
    assert_eq!(header.value_len, 5);
    assert_eq!(header.record_len(), bytes.len());
    assert!(!header.is_tombstone());
}

#[test]
fn test_decode_header_empty_input() {
    let result = DataRecord::decode_header(&[]);

    assert!(matches!(result, Err(CornError::InvalidHeader { actual: 0, .. })));
}

// =============================================================================
// Expiry Tests
// =============================================================================

#[test]
fn test_zero_ttl_never_expires() {
    let record = DataRecord::with_timestamp(b"k".to_vec(), b"v".to_vec(), 0, 0);

    assert!(!record.is_expired_at(i64::MAX));
}

#[test]
fn test_ttl_expiry_boundary() {
    let record = DataRecord::with_timestamp(b"k".to_vec(), b"v".to_vec(), 10, 1_000);

    assert!(!record.is_expired_at(10_999));
    assert!(record.is_expired_at(11_000));
}

#[test]
fn test_new_record_is_stamped_with_current_time() {
    let before = cornkv::record::now_millis();
    let record = DataRecord::new(b"k".to_vec(), b"v".to_vec(), 60);
    let after = cornkv::record::now_millis();

    assert!(record.timestamp >= before && record.timestamp <= after);
    assert!(!record.is_expired());
}
