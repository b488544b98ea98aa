//! The reorg-aware operation log.
//!
//! `OperationDb` is driven by exactly one writer. It owns the change buffer
//! and the undo log; readers go through [`OperationDb::reader`] and only see
//! what a flush has committed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::change_buffer::{ChangeBuffer, OperationConsumer};
use crate::config::SinkConfig;
use crate::cursor::Cursor;
use crate::error::{Result, SinkError};
use crate::key::{user_key, CURSOR_KEY};
use crate::operation::{Operation, OperationBatch, OperationKind};
use crate::reader::KvReader;
use crate::store::KvStore;
use crate::undo::UndoLog;

pub struct OperationDb<S> {
    store: Arc<S>,
    buffer: ChangeBuffer,
    undo: UndoLog<S>,
    query_rows_limit: usize,
    last_cursor: Option<Cursor>,
}

impl<S: KvStore> OperationDb<S> {
    pub fn new(store: Arc<S>, config: &SinkConfig) -> Self {
        Self {
            undo: UndoLog::new(store.clone()),
            store,
            buffer: ChangeBuffer::new(),
            query_rows_limit: config.query_rows_limit,
            last_cursor: None,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Read path over committed state.
    pub fn reader(&self) -> KvReader<S> {
        KvReader::new(self.store.clone(), self.query_rows_limit)
    }

    /// Deletes undo records for blocks at or below `finalized_height`.
    pub fn purge_undo(&self, finalized_height: u64) -> Result<usize> {
        self.undo.purge(finalized_height)
    }

    /// Records the inverse of `batch` for `block_number`.
    ///
    /// Must be called before `batch` is added to the buffer.
    pub fn record_undo(&self, block_number: u64, batch: &[Operation]) -> Result<usize> {
        self.undo.record(block_number, batch)
    }

    pub fn add_operations(&mut self, batch: OperationBatch) {
        self.buffer.add_operations(batch);
    }

    /// Buffers the inverse of every block above `last_valid_block`.
    ///
    /// The result reaches the store on the next flush.
    pub fn replay_undo(&mut self, last_valid_block: u64) -> Result<usize> {
        self.undo.replay(last_valid_block, &mut self.buffer)
    }

    /// Drops the undo records of blocks above `last_valid_block` once their
    /// replay has been flushed.
    pub fn discard_undo_above(&self, last_valid_block: u64) -> Result<usize> {
        self.undo.discard_above(last_valid_block)
    }

    /// Block numbers holding an undo record, highest first.
    pub fn undo_block_numbers(&self) -> Result<Vec<u64>> {
        self.undo.block_numbers()
    }

    /// Number of keys waiting for the next flush.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Applies every pending operation, then persists `cursor`.
    ///
    /// Returns the number of user records written or deleted. On failure the
    /// cursor is left untouched and the pending operations are put back, so
    /// the same flush can be retried. Flushing an empty buffer with the
    /// cursor already written is a no-op.
    pub fn flush(&mut self, cursor: &Cursor) -> Result<usize> {
        let drained = self.buffer.drain();
        if drained.is_empty() && self.last_cursor.as_ref() == Some(cursor) {
            return Ok(0);
        }

        let start = Instant::now();
        match self.apply(&drained, cursor) {
            Ok(count) => {
                tracing::debug!(
                    "Flushed {} entries at block {} in {:?}",
                    count,
                    cursor.block_number,
                    start.elapsed()
                );
                self.last_cursor = Some(cursor.clone());
                Ok(count)
            }
            Err(e) => {
                tracing::warn!("Flush at block {} failed: {}", cursor.block_number, e);
                self.buffer.restore(drained);
                Err(e)
            }
        }
    }

    fn apply(&self, drained: &HashMap<String, Operation>, cursor: &Cursor) -> Result<usize> {
        let mut puts = Vec::new();
        let mut deletes = Vec::new();
        for op in drained.values() {
            match op.kind {
                OperationKind::Set => puts.push(op),
                OperationKind::Delete => deletes.push(user_key(&op.key)),
                OperationKind::Unset => {
                    return Err(SinkError::CorruptOperation(format!(
                        "invalid operation type {} for key '{}'",
                        op.kind, op.key
                    )))
                }
            }
        }

        for op in &puts {
            self.store.put(&user_key(&op.key), &op.value)?;
        }
        if !deletes.is_empty() {
            self.store.batch_delete(&deletes)?;
        }

        self.store.put(CURSOR_KEY, &cursor.encode())?;
        self.store.flush_puts()?;
        Ok(puts.len() + deletes.len())
    }

    /// Reads the persisted cursor.
    pub fn get_cursor(&self) -> Result<Cursor> {
        match self.store.get(CURSOR_KEY)? {
            Some(bytes) => Cursor::decode(&bytes),
            None => Err(SinkError::CursorNotFound),
        }
    }

    /// Persists `cursor` on its own, outside a flush.
    pub fn write_cursor(&mut self, cursor: &Cursor) -> Result<()> {
        self.store.put(CURSOR_KEY, &cursor.encode())?;
        self.store.flush_puts()?;
        self.last_cursor = Some(cursor.clone());
        Ok(())
    }
}
