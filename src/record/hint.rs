//! Hint Record
//!
//! Compact, value-free index entries written next to compacted segments.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{CornError, Result};

/// Header size: Offset (8) + Timestamp (8) + KeyLen (4)
pub const HINT_HEADER_SIZE: usize = 20;

/// Fixed-size prefix of a Hint Record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HintHeader {
    pub offset: u64,
    pub timestamp: i64,
    pub key_len: u32,
}

impl HintHeader {
    pub fn record_len(&self) -> usize {
        HINT_HEADER_SIZE + self.key_len as usize
    }
}

/// A decoded Hint Record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HintRecord {
    /// Start of the matching Data Record in the paired segment
    pub offset: u64,
    pub timestamp: i64,
    pub key: Vec<u8>,
}

impl HintRecord {
    pub fn new(offset: u64, timestamp: i64, key: Vec<u8>) -> Self {
        Self {
            offset,
            timestamp,
            key,
        }
    }

    pub fn encoded_len(&self) -> usize {
        HINT_HEADER_SIZE + self.key.len()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_u64(self.offset);
        buf.put_i64(self.timestamp);
        buf.put_u32(self.key.len() as u32);
        buf.put_slice(&self.key);
        buf.to_vec()
    }

    pub fn decode_header(bytes: &[u8]) -> Result<HintHeader> {
        if bytes.len() < HINT_HEADER_SIZE {
            return Err(CornError::InvalidHeader {
                expected: HINT_HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        let mut buf = &bytes[..HINT_HEADER_SIZE];
        Ok(HintHeader {
            offset: buf.get_u64(),
            timestamp: buf.get_i64(),
            key_len: buf.get_u32(),
        })
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header = Self::decode_header(bytes)?;
        let record_len = header.record_len();

        if record_len > bytes.len() {
            return Err(CornError::CorruptRecord(format!(
                "hint key length {} exceeds {} available bytes",
                header.key_len,
                bytes.len() - HINT_HEADER_SIZE
            )));
        }

        Ok(Self {
            offset: header.offset,
            timestamp: header.timestamp,
            key: bytes[HINT_HEADER_SIZE..record_len].to_vec(),
        })
    }
}
