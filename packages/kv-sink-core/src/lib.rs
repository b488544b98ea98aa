//! Reorg-aware operation log over an ordered key-value store.
//!
//! Buffers per-block Set/Delete operations, records their inverse so a fork
//! can be rolled back, purges that history once blocks are final, and flushes
//! committed state together with a resumability cursor.

pub mod change_buffer;
pub mod config;
pub mod cursor;
pub mod database;
pub mod error;
pub mod key;
pub mod operation;
pub mod reader;
pub mod store;
pub mod undo;

pub use change_buffer::{ChangeBuffer, OperationConsumer};
pub use config::SinkConfig;
pub use cursor::Cursor;
pub use database::OperationDb;
pub use error::{Result, SinkError};
pub use operation::{KeyValue, Operation, OperationBatch, OperationKind};
pub use reader::{KvReader, Page, Reader};
pub use store::{FileStore, KvPair, KvStore, MemoryStore};
pub use undo::UndoLog;
