//! Bounded, ordered in-memory write buffer.

use std::collections::BTreeMap;

use crate::lsm::Entry;

/// An ordered in-memory key/value map with a capacity limit.
///
/// A delete is recorded as [`Entry::Tombstone`] rather than removed
/// outright, so it can shadow older values that live in SSTables until
/// compaction.
pub struct MemTable {
    entries: BTreeMap<Vec<u8>, Entry>,
    max_size: usize,
}

impl MemTable {
    pub fn new(max_size: usize) -> Self {
        MemTable {
            entries: BTreeMap::new(),
            max_size,
        }
    }

    /// Seed a memtable from a pre-built map, e.g. the result of WAL
    /// recovery.
    pub fn from_map(entries: BTreeMap<Vec<u8>, Entry>, max_size: usize) -> Self {
        MemTable { entries, max_size }
    }

    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.entries.insert(key, Entry::Value(value));
    }

    pub fn delete(&mut self, key: Vec<u8>) {
        self.entries.insert(key, Entry::Tombstone);
    }

    pub fn get(&self, key: &[u8]) -> Option<&Entry> {
        self.entries.get(key)
    }

    /// Live (non-tombstone) entries with `lo <= k <= hi`, ascending.
    pub fn range_scan(&self, lo: &[u8], hi: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.range_scan_with_tombstones(lo, hi)
            .into_iter()
            .filter_map(|(k, entry)| match entry {
                Entry::Value(value) => Some((k, value)),
                Entry::Tombstone => None,
            })
            .collect()
    }

    /// Entries with `lo <= k <= hi`, ascending, tombstones included. Used
    /// by merges that must shadow older SSTable values for deleted keys.
    pub fn range_scan_with_tombstones(&self, lo: &[u8], hi: &[u8]) -> Vec<(Vec<u8>, Entry)> {
        if lo > hi {
            return Vec::new();
        }
        self.entries
            .range(lo.to_vec()..=hi.to_vec())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.max_size
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// The full ordered map, for flushing to an SSTable.
    pub fn entries(&self) -> &BTreeMap<Vec<u8>, Entry> {
        &self.entries
    }
}
