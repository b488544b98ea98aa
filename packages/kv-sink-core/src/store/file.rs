//! File-backed store: an in-memory store persisted as a checksummed snapshot.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crc32fast::Hasher;

use super::io_utils::{classify_io_error, retry_store_operation};
use super::memory::MemoryStore;
use super::{KvPair, KvStore};
use crate::config::SinkConfig;
use crate::error::{Result, SinkError};

const SNAPSHOT_FILE: &str = "kv.snapshot";
const SNAPSHOT_MAGIC: &[u8; 4] = b"KVSN";
const SNAPSHOT_VERSION: u32 = 1;
/// magic + version + checksum + body length
const HEADER_LEN: usize = 4 + 4 + 4 + 8;

/// Ordered store persisted to `<data_dir>/kv.snapshot` on every `flush_puts`.
///
/// Reads and writes go to memory; `flush_puts` writes a new snapshot to a
/// temporary file and atomically renames it over the previous one, so a
/// crash leaves either the old or the new snapshot in place.
#[derive(Debug)]
pub struct FileStore {
    inner: MemoryStore,
    path: PathBuf,
    dirty: AtomicBool,
    max_retries: u32,
    retry_delay_ms: u64,
}

impl FileStore {
    /// Opens the store in `config.data_dir`, loading the last snapshot if any.
    pub fn open(config: &SinkConfig) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)
            .map_err(|e| classify_io_error(e, "Failed to create data directory"))?;

        let path = config.data_dir.join(SNAPSHOT_FILE);
        let inner = if path.exists() {
            let entries = retry_store_operation(
                || load_snapshot(&path),
                config.store_max_retries,
                config.store_retry_delay_ms,
                "load_snapshot",
            )?;
            tracing::debug!("Loaded {} entries from {}", entries.len(), path.display());
            MemoryStore::from_entries(entries.into_iter().collect())
        } else {
            MemoryStore::new()
        };

        Ok(Self {
            inner,
            path,
            dirty: AtomicBool::new(false),
            max_retries: config.store_max_retries,
            retry_delay_ms: config.store_retry_delay_ms,
        })
    }

    /// Path of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns every key, in order.
    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.inner.keys()
    }

    fn persist(&self) -> Result<()> {
        let entries = self.inner.snapshot();
        retry_store_operation(
            || write_snapshot(&self.path, &entries),
            self.max_retries,
            self.retry_delay_ms,
            "write_snapshot",
        )?;
        tracing::debug!(
            "Persisted {} entries to {}",
            entries.len(),
            self.path.display()
        );
        Ok(())
    }
}

fn write_snapshot(path: &Path, entries: &[(Vec<u8>, Vec<u8>)]) -> Result<()> {
    let body = bincode::serialize(entries)?;
    let mut hasher = Hasher::new();
    hasher.update(&body);
    let checksum = hasher.finalize();

    let temp_path = path.with_extension("snapshot.tmp");
    let mut file =
        File::create(&temp_path).map_err(|e| classify_io_error(e, "Failed to create temp file"))?;
    file.write_all(SNAPSHOT_MAGIC)
        .and_then(|_| file.write_all(&SNAPSHOT_VERSION.to_le_bytes()))
        .and_then(|_| file.write_all(&checksum.to_le_bytes()))
        .and_then(|_| file.write_all(&(body.len() as u64).to_le_bytes()))
        .and_then(|_| file.write_all(&body))
        .map_err(|e| classify_io_error(e, "Failed to write snapshot"))?;
    file.sync_all()
        .map_err(|e| classify_io_error(e, "Failed to sync snapshot"))?;

    fs::rename(&temp_path, path).map_err(|e| classify_io_error(e, "Failed to rename snapshot"))?;
    Ok(())
}

fn load_snapshot(path: &Path) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
    let mut file = File::open(path).map_err(|e| classify_io_error(e, "Failed to open snapshot"))?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)
        .map_err(|e| classify_io_error(e, "Failed to read snapshot"))?;

    if data.len() < HEADER_LEN {
        return Err(SinkError::Store(format!(
            "Snapshot {} is truncated ({} bytes)",
            path.display(),
            data.len()
        )));
    }
    if &data[0..4] != SNAPSHOT_MAGIC {
        return Err(SinkError::Store(format!(
            "Snapshot {} has an invalid magic",
            path.display()
        )));
    }

    let version = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    if version != SNAPSHOT_VERSION {
        return Err(SinkError::Store(format!(
            "Unsupported snapshot version: {}",
            version
        )));
    }

    let checksum = u32::from_le_bytes([data[8], data[9], data[10], data[11]]);
    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&data[12..HEADER_LEN]);
    let body_len = u64::from_le_bytes(len_bytes) as usize;
    let body = &data[HEADER_LEN..];
    if body.len() != body_len {
        return Err(SinkError::Store(format!(
            "Snapshot body length mismatch: header says {}, found {}",
            body_len,
            body.len()
        )));
    }

    let mut hasher = Hasher::new();
    hasher.update(body);
    if hasher.finalize() != checksum {
        return Err(SinkError::Store(format!(
            "Snapshot {} checksum mismatch",
            path.display()
        )));
    }

    Ok(bincode::deserialize(body)?)
}

impl KvStore for FileStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.inner.get(key)
    }

    fn batch_get(&self, keys: &[Vec<u8>]) -> Result<Vec<Option<Vec<u8>>>> {
        self.inner.batch_get(keys)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.inner.put(key, value)?;
        self.dirty.store(true, Ordering::Release);
        Ok(())
    }

    fn batch_delete(&self, keys: &[Vec<u8>]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        self.inner.batch_delete(keys)?;
        self.dirty.store(true, Ordering::Release);
        Ok(())
    }

    fn scan(&self, start: &[u8], end_exclusive: &[u8], limit: usize) -> Result<Vec<KvPair>> {
        self.inner.scan(start, end_exclusive, limit)
    }

    fn prefix(&self, prefix: &[u8], limit: usize) -> Result<Vec<KvPair>> {
        self.inner.prefix(prefix, limit)
    }

    fn flush_puts(&self) -> Result<()> {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        if let Err(e) = self.persist() {
            self.dirty.store(true, Ordering::Release);
            return Err(e);
        }
        Ok(())
    }
}
