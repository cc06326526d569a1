//! KeyDir implementation

use std::collections::HashMap;

use crate::segment::SegmentId;

use super::KeyDirEntry;

/// The in-memory index
#[derive(Debug, Default)]
pub struct KeyDir {
    entries: HashMap<Vec<u8>, KeyDirEntry>,
}

impl KeyDir {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &[u8]) -> Option<&KeyDirEntry> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.entries.contains_key(key)
    }

    /// Unconditional overwrite; returns the previous entry
    pub fn insert(&mut self, key: Vec<u8>, entry: KeyDirEntry) -> Option<KeyDirEntry> {
        self.entries.insert(key, entry)
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<KeyDirEntry> {
        self.entries.remove(key)
    }

    /// Point `key` at `to`, but only if it still refers to (`segment_id`, `offset`)
    ///
    /// Returns false when a newer write has superseded the old location.
    pub fn relocate(
        &mut self,
        key: &[u8],
        segment_id: SegmentId,
        offset: u64,
        to: KeyDirEntry,
    ) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) if entry.points_at(segment_id, offset) => {
                *entry = to;
                true
            }
            _ => false,
        }
    }

    /// Remove `key` only if it still refers to (`segment_id`, `offset`)
    pub fn remove_if_at(&mut self, key: &[u8], segment_id: SegmentId, offset: u64) -> bool {
        match self.entries.get(key) {
            Some(entry) if entry.points_at(segment_id, offset) => {
                self.entries.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Snapshot of all indexed keys (unordered)
    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.entries.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Vec<u8>, &KeyDirEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
