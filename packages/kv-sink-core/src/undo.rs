//! Per-block inverse operations.
//!
//! Every block's inverse is stored under its undo key before the block's
//! operations reach the change buffer. Once a block is final its record is
//! purged; on a fork the records above the last valid block are replayed,
//! highest block first, into the change buffer.

use std::sync::Arc;

use crate::change_buffer::OperationConsumer;
use crate::error::Result;
use crate::key::{undo_block_number, undo_key, user_key, UNDO_KEY_END, UNDO_KEY_PREFIX};
use crate::operation::{decode_batch, encode_batch, Operation, OperationBatch, OperationKind};
use crate::store::KvStore;

/// Undo records over a shared store.
#[derive(Debug)]
pub struct UndoLog<S> {
    store: Arc<S>,
}

impl<S: KvStore> UndoLog<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Computes the inverse of `batch` against committed store state.
    ///
    /// Previous values come from the store, never from pending operations.
    /// The result is in reverse application order, so applying it first to
    /// last undoes `batch`.
    pub fn compute_inverse(&self, batch: &[Operation]) -> Result<OperationBatch> {
        for op in batch {
            op.validate()?;
        }

        let keys: Vec<Vec<u8>> = batch.iter().map(|op| user_key(&op.key)).collect();
        let previous = self.store.batch_get(&keys)?;

        let mut inverse = Vec::with_capacity(batch.len());
        for (op, prev) in batch.iter().zip(previous) {
            let undo = match (op.kind, prev) {
                (OperationKind::Set | OperationKind::Delete, Some(value)) => {
                    Some(Operation::set(op.key.clone(), value))
                }
                (OperationKind::Set, None) => Some(Operation::delete(op.key.clone())),
                // Deleting an absent key changes nothing. Unset was rejected above.
                (OperationKind::Delete, None) | (OperationKind::Unset, _) => None,
            };
            if let Some(undo) = undo {
                inverse.push(undo);
            }
        }
        inverse.reverse();
        Ok(inverse)
    }

    /// Computes and stores the inverse of `batch` under `block_number`.
    ///
    /// Returns the number of inverse operations recorded.
    pub fn record(&self, block_number: u64, batch: &[Operation]) -> Result<usize> {
        let inverse = self.compute_inverse(batch)?;
        let bytes = encode_batch(&inverse)?;
        self.store.put(&undo_key(block_number), &bytes)?;
        tracing::trace!(
            "Recorded {} undo operations for block {}",
            inverse.len(),
            block_number
        );
        Ok(inverse.len())
    }

    /// Deletes every undo record for a block at or below `finalized_height`.
    pub fn purge(&self, finalized_height: u64) -> Result<usize> {
        let records = self
            .store
            .scan(&undo_key(finalized_height), &UNDO_KEY_END, 0)?;
        if records.is_empty() {
            return Ok(0);
        }

        let keys: Vec<Vec<u8>> = records.into_iter().map(|pair| pair.key).collect();
        self.store.batch_delete(&keys)?;
        tracing::debug!(
            "Purged {} undo records at or below block {}",
            keys.len(),
            finalized_height
        );
        Ok(keys.len())
    }

    /// Feeds the inverse of every block above `last_valid_block` to
    /// `consumer`, highest block first.
    ///
    /// Every record is decoded before any is fed, so a corrupt record leaves
    /// the consumer untouched. Records are not deleted; see
    /// [`UndoLog::discard_above`].
    pub fn replay<C: OperationConsumer>(
        &self,
        last_valid_block: u64,
        consumer: &mut C,
    ) -> Result<usize> {
        let records = self
            .store
            .scan(&undo_key(u64::MAX), &undo_key(last_valid_block), 0)?;

        let batches = records
            .iter()
            .map(|pair| decode_batch(&pair.value))
            .collect::<Result<Vec<_>>>()?;

        let count = batches.len();
        for batch in batches {
            consumer.add_operations(batch);
        }
        tracing::debug!(
            "Replayed {} undo records above block {}",
            count,
            last_valid_block
        );
        Ok(count)
    }

    /// Deletes every undo record above `last_valid_block`.
    pub fn discard_above(&self, last_valid_block: u64) -> Result<usize> {
        let records = self
            .store
            .scan(&undo_key(u64::MAX), &undo_key(last_valid_block), 0)?;
        if records.is_empty() {
            return Ok(0);
        }

        let keys: Vec<Vec<u8>> = records.into_iter().map(|pair| pair.key).collect();
        self.store.batch_delete(&keys)?;
        Ok(keys.len())
    }

    /// Block numbers that currently have an undo record, highest first.
    pub fn block_numbers(&self) -> Result<Vec<u64>> {
        let records = self.store.scan(&UNDO_KEY_PREFIX, &UNDO_KEY_END, 0)?;
        Ok(records
            .iter()
            .filter_map(|pair| undo_block_number(&pair.key))
            .collect())
    }

    /// Loads the stored inverse for `block_number`, if any.
    pub fn load(&self, block_number: u64) -> Result<Option<OperationBatch>> {
        match self.store.get(&undo_key(block_number))? {
            Some(bytes) => Ok(Some(decode_batch(&bytes)?)),
            None => Ok(None),
        }
    }
}
