//! In-memory ordered store.

use std::collections::BTreeMap;
use std::ops::Bound;

use parking_lot::RwLock;

use super::{KvPair, KvStore};
use crate::error::Result;

/// Ordered in-memory store.
///
/// One writer and any number of readers; a write is visible as soon as the
/// call returns.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `entries`.
    pub fn from_entries(entries: BTreeMap<Vec<u8>, Vec<u8>>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Copies every entry out, in key order.
    pub fn snapshot(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Returns every key, in order.
    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.entries.read().keys().cloned().collect()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if the store holds nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

fn take_limited<'a>(iter: impl Iterator<Item = (&'a Vec<u8>, &'a Vec<u8>)>, limit: usize) -> Vec<KvPair> {
    let limit = if limit == 0 { usize::MAX } else { limit };
    iter.take(limit)
        .map(|(k, v)| KvPair {
            key: k.clone(),
            value: v.clone(),
        })
        .collect()
}

impl KvStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn batch_get(&self, keys: &[Vec<u8>]) -> Result<Vec<Option<Vec<u8>>>> {
        let entries = self.entries.read();
        Ok(keys.iter().map(|k| entries.get(k).cloned()).collect())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.entries.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn batch_delete(&self, keys: &[Vec<u8>]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut entries = self.entries.write();
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    fn scan(&self, start: &[u8], end_exclusive: &[u8], limit: usize) -> Result<Vec<KvPair>> {
        if start >= end_exclusive {
            return Ok(Vec::new());
        }
        let entries = self.entries.read();
        let range = entries.range::<[u8], _>((
            Bound::Included(start),
            Bound::Excluded(end_exclusive),
        ));
        Ok(take_limited(range, limit))
    }

    fn prefix(&self, prefix: &[u8], limit: usize) -> Result<Vec<KvPair>> {
        let entries = self.entries.read();
        let range = entries
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix));
        Ok(take_limited(range, limit))
    }
}
