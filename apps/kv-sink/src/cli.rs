use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use kv_sink_core::SinkConfig;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply a JSON-lines block event file, optionally serving queries
    Inject {
        /// Directory holding the store snapshot
        data_dir: PathBuf,

        /// Newline-delimited JSON block events
        events_file: PathBuf,

        /// Flush every N blocks while catching up
        #[arg(long, default_value_t = 1000)]
        flush_interval: u64,

        /// First block to apply on a fresh store
        #[arg(long, default_value_t = 0)]
        start_block: u64,

        #[command(flatten)]
        query: QueryArgs,

        /// Address of the query server; disabled when omitted
        #[arg(long)]
        listen_addr: Option<SocketAddr>,
    },

    /// Serve queries over an existing store
    Serve {
        data_dir: PathBuf,

        #[command(flatten)]
        query: QueryArgs,

        #[arg(long, default_value = "127.0.0.1:8080")]
        listen_addr: SocketAddr,
    },

    /// Print the cursor and undo history of a store
    Inspect { data_dir: PathBuf },
}

#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// Serve every route under /<prefix>
    #[arg(long)]
    pub api_prefix: Option<String>,

    /// Largest `limit` a query may request
    #[arg(long, default_value_t = 1000)]
    pub query_rows_limit: usize,

    /// Request timeout in milliseconds
    #[arg(long, default_value_t = 5000)]
    pub request_timeout_ms: u64,
}

impl QueryArgs {
    pub fn apply(&self, config: SinkConfig) -> SinkConfig {
        config
            .query_rows_limit(self.query_rows_limit)
            .request_timeout_ms(self.request_timeout_ms)
    }
}
