//! Sink configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Sink configuration.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Data directory for the file-backed store
    pub data_dir: PathBuf,
    /// Upper bound for `limit` on prefix and range queries
    pub query_rows_limit: usize,
    /// Flush every N blocks while catching up on final blocks
    pub flush_interval_blocks: u64,
    /// First block to process when no cursor exists yet
    pub start_block: u64,
    /// How often the stats line is logged
    pub stats_interval: Duration,
    /// Maximum retry attempts for transient store errors
    pub store_max_retries: u32,
    /// Delay between retry attempts in milliseconds
    pub store_retry_delay_ms: u64,
    /// Query request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            query_rows_limit: 1000,
            flush_interval_blocks: 1000,
            start_block: 0,
            stats_interval: Duration::from_secs(2),
            store_max_retries: 3,
            store_retry_delay_ms: 100,
            request_timeout_ms: 5000,
        }
    }
}

impl SinkConfig {
    /// Create a new config with the given data directory
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Set the query rows limit
    pub fn query_rows_limit(mut self, limit: usize) -> Self {
        self.query_rows_limit = limit;
        self
    }

    /// Set the catch-up flush interval. Zero is treated as one.
    pub fn flush_interval_blocks(mut self, interval: u64) -> Self {
        self.flush_interval_blocks = interval.max(1);
        self
    }

    /// Set the start block used on cold start
    pub fn start_block(mut self, block: u64) -> Self {
        self.start_block = block;
        self
    }

    /// Set the stats logging interval
    pub fn stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }

    /// Set retry behaviour for transient store errors
    pub fn store_retries(mut self, max_retries: u32, delay_ms: u64) -> Self {
        self.store_max_retries = max_retries;
        self.store_retry_delay_ms = delay_ms;
        self
    }

    /// Set the query request timeout
    pub fn request_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.request_timeout_ms = timeout_ms;
        self
    }
}
