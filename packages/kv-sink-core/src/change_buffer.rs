//! Pending, not-yet-flushed operations.

use std::collections::HashMap;

use crate::operation::{Operation, OperationBatch};

/// Receives batches of operations, in order.
///
/// Undo replay feeds inverse batches through this seam.
pub trait OperationConsumer {
    fn add_operations(&mut self, batch: OperationBatch);
}

/// Holds at most one pending operation per key.
///
/// The entry for a key is always the most recently added operation for it,
/// across every block buffered since the last drain. The buffer never touches
/// the store.
#[derive(Debug, Default)]
pub struct ChangeBuffer {
    pending: HashMap<String, Operation>,
}

impl ChangeBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Upserts `op`, replacing any pending operation for the same key.
    pub fn add_operation(&mut self, op: Operation) {
        self.pending.insert(op.key.clone(), op);
    }

    /// Takes every pending operation, leaving the buffer empty.
    pub fn drain(&mut self) -> HashMap<String, Operation> {
        std::mem::take(&mut self.pending)
    }

    /// Puts back a drained change set after a failed flush.
    ///
    /// Operations added since the drain win over the restored ones.
    pub fn restore(&mut self, drained: HashMap<String, Operation>) {
        for (key, op) in drained {
            self.pending.entry(key).or_insert(op);
        }
    }

    /// Returns the pending operation for `key`, if any.
    pub fn get(&self, key: &str) -> Option<&Operation> {
        self.pending.get(key)
    }

    /// Returns the number of pending keys.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl OperationConsumer for ChangeBuffer {
    fn add_operations(&mut self, batch: OperationBatch) {
        for op in batch {
            self.add_operation(op);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::OperationKind;
    use ntest::timeout;

    #[timeout(1000)]
    #[test]
    fn test_last_write_wins_within_batch() {
        let mut buffer = ChangeBuffer::new();
        buffer.add_operations(vec![
            Operation::set("k", "a"),
            Operation::set("k", "b"),
            Operation::delete("k"),
        ]);

        assert_eq!(buffer.len(), 1);
        let pending = buffer.get("k").unwrap();
        assert_eq!(pending.kind, OperationKind::Delete);
        assert_eq!(pending, &Operation::delete("k"));
    }

    #[timeout(1000)]
    #[test]
    fn test_last_write_wins_across_batches() {
        let mut buffer = ChangeBuffer::new();
        buffer.add_operations(vec![Operation::set("a", "1"), Operation::set("b", "1")]);
        buffer.add_operations(vec![Operation::set("a", "2")]);

        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.get("a").unwrap().value, b"2".to_vec());
        assert_eq!(buffer.get("b").unwrap().value, b"1".to_vec());
    }

    #[timeout(1000)]
    #[test]
    fn test_drain_clears_buffer() {
        let mut buffer = ChangeBuffer::new();
        buffer.add_operation(Operation::set("a", "1"));

        let drained = buffer.drain();
        assert_eq!(drained.len(), 1);
        assert!(buffer.is_empty());
        assert!(buffer.drain().is_empty());
    }

    #[timeout(1000)]
    #[test]
    fn test_restore_keeps_newer_operations() {
        let mut buffer = ChangeBuffer::new();
        buffer.add_operations(vec![Operation::set("a", "1"), Operation::set("b", "1")]);
        let drained = buffer.drain();

        buffer.add_operation(Operation::set("a", "2"));
        buffer.restore(drained);

        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.get("a").unwrap().value, b"2".to_vec());
        assert_eq!(buffer.get("b").unwrap().value, b"1".to_vec());
    }
}
