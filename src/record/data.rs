//! Data Record
//!
//! One physical entry in a segment file.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{CornError, Result};

/// Header size: CRC (4) + Timestamp (8) + TTL (4) + KeyLen (4) + ValLen (4)
pub const HEADER_SIZE: usize = 24;

/// Offset of the first checksummed byte
const CRC_SIZE: usize = 4;

/// Fixed-size prefix of a Data Record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub checksum: u32,
    /// Unix milliseconds
    pub timestamp: i64,
    /// Seconds until expiry, 0 = never
    pub ttl: u32,
    pub key_len: u32,
    pub value_len: u32,
}

impl RecordHeader {
    /// Total on-disk size of the record this header starts
    pub fn record_len(&self) -> usize {
        HEADER_SIZE + self.key_len as usize + self.value_len as usize
    }

    pub fn is_tombstone(&self) -> bool {
        self.value_len == 0
    }
}

/// A decoded Data Record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRecord {
    /// Unix milliseconds at write time
    pub timestamp: i64,
    /// Seconds until expiry, 0 = never
    pub ttl: u32,
    pub key: Vec<u8>,
    /// Empty for tombstones
    pub value: Vec<u8>,
}

impl DataRecord {
    /// Build a record stamped with the current time
    pub fn new(key: Vec<u8>, value: Vec<u8>, ttl: u32) -> Self {
        Self::with_timestamp(key, value, ttl, super::now_millis())
    }

    pub fn with_timestamp(key: Vec<u8>, value: Vec<u8>, ttl: u32, timestamp: i64) -> Self {
        Self {
            timestamp,
            ttl,
            key,
            value,
        }
    }

    /// Build a deletion marker for `key`
    pub fn tombstone(key: Vec<u8>) -> Self {
        Self::new(key, Vec::new(), 0)
    }

    pub fn is_tombstone(&self) -> bool {
        self.value.is_empty()
    }

    /// Whether the TTL has elapsed at `now` (Unix milliseconds)
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.ttl != 0 && self.timestamp.saturating_add(self.ttl as i64 * 1000) <= now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(super::now_millis())
    }

    /// Size of the encoded record in bytes
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.key.len() + self.value.len()
    }

    /// Encode to the on-disk layout, filling in the checksum
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_u32(0); // checksum placeholder
        buf.put_i64(self.timestamp);
        buf.put_u32(self.ttl);
        buf.put_u32(self.key.len() as u32);
        buf.put_u32(self.value.len() as u32);
        buf.put_slice(&self.key);
        buf.put_slice(&self.value);

        let checksum = crc32fast::hash(&buf[CRC_SIZE..]);
        buf[..CRC_SIZE].copy_from_slice(&checksum.to_be_bytes());
        buf.to_vec()
    }

    /// Decode only the fixed header
    ///
    /// Fails with `InvalidHeader` when fewer than `HEADER_SIZE` bytes are given.
    pub fn decode_header(bytes: &[u8]) -> Result<RecordHeader> {
        if bytes.len() < HEADER_SIZE {
            return Err(CornError::InvalidHeader {
                expected: HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        let mut buf = &bytes[..HEADER_SIZE];
        Ok(RecordHeader {
            checksum: buf.get_u32(),
            timestamp: buf.get_i64(),
            ttl: buf.get_u32(),
            key_len: buf.get_u32(),
            value_len: buf.get_u32(),
        })
    }

    /// Decode a full record and verify its checksum
    ///
    /// Bytes past the declared record length are ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header = Self::decode_header(bytes)?;
        let record_len = header.record_len();

        if record_len > bytes.len() {
            return Err(CornError::CorruptRecord(format!(
                "declared length {} exceeds {} available bytes",
                record_len,
                bytes.len()
            )));
        }

        let actual = crc32fast::hash(&bytes[CRC_SIZE..record_len]);
        if actual != header.checksum {
            return Err(CornError::CorruptRecord(format!(
                "checksum mismatch: stored {:#010x}, computed {:#010x}",
                header.checksum, actual
            )));
        }

        let key_end = HEADER_SIZE + header.key_len as usize;
        Ok(Self {
            timestamp: header.timestamp,
            ttl: header.ttl,
            key: bytes[HEADER_SIZE..key_end].to_vec(),
            value: bytes[key_end..record_len].to_vec(),
        })
    }
}
