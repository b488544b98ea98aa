//! Block handler driving the operation log from an ordered block stream.

pub mod block;
pub mod sinker;
pub mod source;
pub mod stats;

pub use block::BlockEvent;
pub use sinker::Sinker;
pub use source::{encode_event, JsonLinesSource};
pub use stats::{Stats, StatsReporter, StatsSnapshot};

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, kv_sink_core::SinkError>;
