//! Shared fixtures for the integration tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use kv_sink_core::key::{is_undo_key, is_user_key, undo_block_number, CURSOR_KEY};
use kv_sink_core::{
    Cursor, KvPair, KvStore, MemoryStore, Operation, OperationDb, Result, SinkConfig, SinkError,
};

/// Human-readable names for every physical key, in store order.
pub fn physical_keys(store: &MemoryStore) -> Vec<String> {
    store
        .keys()
        .iter()
        .map(|key| describe_key(key))
        .collect()
}

pub fn describe_key(key: &[u8]) -> String {
    if key == CURSOR_KEY {
        "cursor".to_string()
    } else if is_undo_key(key) {
        format!("undo:{}", undo_block_number(key).unwrap())
    } else if is_user_key(key) {
        format!("user:{}", String::from_utf8_lossy(&key[1..]))
    } else {
        format!("raw:{:?}", key)
    }
}

pub fn cursor_at(block: u64) -> Cursor {
    Cursor::new(format!("token-{}", block), format!("id-{}", block), block)
}

/// Processes one data block the way the block handler does.
pub fn apply_block<S: KvStore>(
    db: &mut OperationDb<S>,
    block: u64,
    previous_finalized: Option<u64>,
    operations: Vec<Operation>,
    flush: bool,
) -> Result<usize> {
    if let Some(finalized) = previous_finalized {
        db.purge_undo(finalized)?;
    }
    db.record_undo(block, &operations)?;
    db.add_operations(operations);
    if flush {
        db.flush(&cursor_at(block))
    } else {
        Ok(0)
    }
}

pub fn memory_db() -> (Arc<MemoryStore>, OperationDb<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let db = OperationDb::new(store.clone(), &SinkConfig::default());
    (store, db)
}

/// Store wrapper counting mutating calls, optionally failing puts.
#[derive(Default)]
pub struct CountingStore {
    pub inner: MemoryStore,
    pub puts: AtomicUsize,
    pub deletes: AtomicUsize,
    pub flushes: AtomicUsize,
    pub fail_puts: AtomicBool,
}

impl CountingStore {
    pub fn mutations(&self) -> usize {
        self.puts.load(Ordering::SeqCst) + self.deletes.load(Ordering::SeqCst)
    }
}

impl KvStore for CountingStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.inner.get(key)
    }

    fn batch_get(&self, keys: &[Vec<u8>]) -> Result<Vec<Option<Vec<u8>>>> {
        self.inner.batch_get(keys)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(SinkError::Store("injected put failure".to_string()));
        }
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(key, value)
    }

    fn batch_delete(&self, keys: &[Vec<u8>]) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.batch_delete(keys)
    }

    fn scan(&self, start: &[u8], end_exclusive: &[u8], limit: usize) -> Result<Vec<KvPair>> {
        self.inner.scan(start, end_exclusive, limit)
    }

    fn prefix(&self, prefix: &[u8], limit: usize) -> Result<Vec<KvPair>> {
        self.inner.prefix(prefix, limit)
    }

    fn flush_puts(&self) -> Result<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
