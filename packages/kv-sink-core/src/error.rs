//! Sink error types.

use thiserror::Error;

/// Result type used across the sink.
pub type Result<T> = std::result::Result<T, SinkError>;

/// Errors raised by the operation log, the read path and store backends.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// Query target absent
    #[error("not found")]
    NotFound,

    /// Malformed query parameters
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// No checkpoint has been written yet
    #[error("cursor not found")]
    CursorNotFound,

    /// Persisted cursor could not be parsed
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    /// Operation kind outside {Set, Delete} or a malformed undo record
    #[error("corrupt operation: {0}")]
    CorruptOperation(String),

    /// Backend I/O failure
    #[error("store failure: {0}")]
    Store(String),

    /// Backend I/O failure that may succeed on retry
    #[error("transient store failure: {0}")]
    TransientStore(String),

    /// Encoding or decoding failure outside the undo wire format
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl SinkError {
    /// Returns true for errors the read path surfaces to callers as typed results.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SinkError::NotFound | SinkError::InvalidArguments(_))
    }

    /// Returns true for store failures. Set and Delete are idempotent, so the
    /// in-flight block can be retried after one of these.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, SinkError::Store(_) | SinkError::TransientStore(_))
    }
}

impl From<bincode::Error> for SinkError {
    fn from(err: bincode::Error) -> Self {
        SinkError::Serialization(err.to_string())
    }
}
