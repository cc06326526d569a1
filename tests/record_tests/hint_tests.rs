//! Tests for Hint Record encoding and decoding

use cornkv::record::{HintRecord, HINT_HEADER_SIZE};
use cornkv::CornError;

#[test]
fn test_encode_decode_hint() {
    let hint = HintRecord::new(4096, 1_700_000_000_000, b"wang".to_vec());

    let bytes = hint.encode();

    assert_eq!(bytes.len(), HINT_HEADER_SIZE + 4);
    assert_eq!(HintRecord::decode(&bytes).unwrap(), hint);
}

#[test]
fn test_hint_layout() {
    let bytes = HintRecord::new(1, 2, b"k".to_vec()).encode();

    assert_eq!(&bytes[0..8], &[0, 0, 0, 0, 0, 0, 0, 1]);
    assert_eq!(&bytes[8..16], &[0, 0, 0, 0, 0, 0, 0, 2]);
    assert_eq!(&bytes[16..20], &[0, 0, 0, 1]);
    assert_eq!(&bytes[20..], b"k");
}

#[test]
fn test_decode_hint_header() {
    let bytes = HintRecord::new(77, 5, b"abc".to_vec()).encode();

    let header = HintRecord::decode_header(&bytes).unwrap();

    assert_eq!(header.offset, 77);
    assert_eq!(header.timestamp, 5);
    assert_eq!(header.key_len, 3);
    assert_eq!(header.record_len(), bytes.len());
}

#[test]
fn test_short_hint_header() {
    let result = HintRecord::decode_header(&[0u8; 19]);

    assert!(matches!(
        result,
        Err(CornError::InvalidHeader { expected: 20, actual: 19 })
    ));
}

#[test]
fn test_hint_key_past_end() {
    let bytes = HintRecord::new(0, 0, b"abcdef".to_vec()).encode();

    let result = HintRecord::decode(&bytes[..bytes.len() - 2]);

    assert!(matches!(result, Err(CornError::CorruptRecord(_))));
}
