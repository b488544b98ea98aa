//! Backing store interface and implementations.
//!
//! The operation log only needs a narrow set of primitives from the store:
//! point reads and writes, batched reads and deletes, and ordered range and
//! prefix scans. Writes must be visible to readers once the call returns.

mod file;
mod io_utils;
mod memory;

pub use file::FileStore;
pub use io_utils::{classify_io_error, retry_store_operation};
pub use memory::MemoryStore;

use crate::error::Result;

/// A raw key/value pair as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvPair {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// Ordered key-value store primitives.
pub trait KvStore: Send + Sync {
    /// Point read. `None` when the key is absent.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Reads several keys, preserving input order.
    fn batch_get(&self, keys: &[Vec<u8>]) -> Result<Vec<Option<Vec<u8>>>>;

    /// Point write.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Deletes every key in `keys`. Absent keys are ignored.
    fn batch_delete(&self, keys: &[Vec<u8>]) -> Result<()>;

    /// Ascending scan over `[start, end_exclusive)`. A `limit` of 0 is unbounded.
    fn scan(&self, start: &[u8], end_exclusive: &[u8], limit: usize) -> Result<Vec<KvPair>>;

    /// Ascending scan over keys starting with `prefix`. A `limit` of 0 is unbounded.
    fn prefix(&self, prefix: &[u8], limit: usize) -> Result<Vec<KvPair>>;

    /// Makes every write so far durable.
    fn flush_puts(&self) -> Result<()> {
        Ok(())
    }
}

impl<S: KvStore + ?Sized> KvStore for std::sync::Arc<S> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn batch_get(&self, keys: &[Vec<u8>]) -> Result<Vec<Option<Vec<u8>>>> {
        (**self).batch_get(keys)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        (**self).put(key, value)
    }

    fn batch_delete(&self, keys: &[Vec<u8>]) -> Result<()> {
        (**self).batch_delete(keys)
    }

    fn scan(&self, start: &[u8], end_exclusive: &[u8], limit: usize) -> Result<Vec<KvPair>> {
        (**self).scan(start, end_exclusive, limit)
    }

    fn prefix(&self, prefix: &[u8], limit: usize) -> Result<Vec<KvPair>> {
        (**self).prefix(prefix, limit)
    }

    fn flush_puts(&self) -> Result<()> {
        (**self).flush_puts()
    }
}
