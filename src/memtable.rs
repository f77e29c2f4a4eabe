use crate::segment::KVEntry;

use crossbeam_skiplist::SkipMap;

use std::sync::atomic::{AtomicUsize, Ordering};

/// Concurrent sorted in-memory table.
///
/// Values are `Option<Vec<u8>>`; a `None` marks a deletion that must survive
/// the flush as a tombstone. Size accounting is approximate (overwrites keep
/// charging), which only means the flush trigger fires a little early under
/// heavy overwrite churn.
pub struct Memtable {
    data: SkipMap<Vec<u8>, Option<Vec<u8>>>,
    approx_bytes: AtomicUsize,
    max_bytes: usize,
}

impl Memtable {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            data: SkipMap::new(),
            approx_bytes: AtomicUsize::new(0),
            max_bytes,
        }
    }

    /// Inserts or overwrites a key.
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) {
        self.approx_bytes
            .fetch_add(key.len() + value.len(), Ordering::SeqCst);
        self.data.insert(key, Some(value));
    }

    /// Records a deletion tombstone for `key`.
    pub fn delete(&self, key: Vec<u8>) {
        self.approx_bytes.fetch_add(key.len(), Ordering::SeqCst);
        self.data.insert(key, None);
    }

    /// Outer `None`: the key is unknown here. Inner `None`: the key is
    /// tombstoned, which shadows any older value in the segments below.
    pub fn get(&self, key: &[u8]) -> Option<Option<Vec<u8>>> {
        self.data.get(key).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn approx_bytes(&self) -> usize {
        self.approx_bytes.load(Ordering::SeqCst)
    }

    pub fn should_flush(&self) -> bool {
        self.approx_bytes() >= self.max_bytes
    }

    /// Takes everything out as a sorted run and leaves the table empty.
    pub fn drain_sorted(&self) -> Vec<KVEntry> {
        let entries: Vec<KVEntry> = self
            .data
            .iter()
            .map(|entry| KVEntry {
                key: entry.key().clone(),
                value: entry.value().clone(),
            })
            .collect();

        for entry in &entries {
            self.data.remove(&entry.key);
        }
        self.approx_bytes.store(0, Ordering::SeqCst);

        entries
    }
}
