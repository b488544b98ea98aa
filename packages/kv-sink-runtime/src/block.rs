//! Events delivered by the upstream block stream.

use kv_sink_core::{Cursor, OperationBatch};

/// One upstream callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockEvent {
    /// Forward progress: the operations produced by `block`
    Data {
        block: u64,
        finalized_height: u64,
        operations: OperationBatch,
        cursor: Cursor,
    },
    /// Fork: every block above `last_valid_block` must be undone
    Undo { last_valid_block: u64, cursor: Cursor },
}

impl BlockEvent {
    /// Cursor delivered with the event.
    pub fn cursor(&self) -> &Cursor {
        match self {
            BlockEvent::Data { cursor, .. } | BlockEvent::Undo { cursor, .. } => cursor,
        }
    }

    /// Block the event refers to.
    pub fn block_number(&self) -> u64 {
        match self {
            BlockEvent::Data { block, .. } => *block,
            BlockEvent::Undo {
                last_valid_block, ..
            } => *last_valid_block,
        }
    }
}
