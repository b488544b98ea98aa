//! Reorg-aware key-value sink.
//!
//! Applies an ordered stream of block events to a file-backed store, keeps
//! undo history for reorg-able blocks and serves committed state over HTTP.

mod cli;

use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tokio::sync::oneshot;

use cli::{Cli, Commands, QueryArgs};
use kv_sink_api::{run_service, ServiceKind};
use kv_sink_core::{FileStore, KvReader, OperationDb, Reader, SinkConfig, SinkError};
use kv_sink_runtime::{JsonLinesSource, Sinker};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt::init();

    match cli.command {
        Commands::Inject {
            data_dir,
            events_file,
            flush_interval,
            start_block,
            query,
            listen_addr,
        } => {
            let config = query.apply(
                SinkConfig::new(data_dir)
                    .flush_interval_blocks(flush_interval)
                    .start_block(start_block),
            );
            let service = ServiceKind::from_args(listen_addr, query.api_prefix.clone());
            inject(config, &events_file, service).await
        }
        Commands::Serve {
            data_dir,
            query,
            listen_addr,
        } => {
            let config = query.apply(SinkConfig::new(data_dir));
            serve(config, &query, listen_addr).await
        }
        Commands::Inspect { data_dir } => inspect(SinkConfig::new(data_dir)),
    }
}

fn open_store(config: &SinkConfig) -> anyhow::Result<Arc<FileStore>> {
    let store = FileStore::open(config)
        .with_context(|| format!("Failed to open store in {}", config.data_dir.display()))?;
    Ok(Arc::new(store))
}

async fn inject(config: SinkConfig, events_file: &Path, service: ServiceKind) -> anyhow::Result<()> {
    let store = open_store(&config)?;
    let db = OperationDb::new(store, &config);
    let reader: Arc<dyn Reader> = Arc::new(db.reader());

    let mut sinker = Sinker::new(db, config.clone());
    let cursor = sinker.start()?;
    tracing::info!(
        "Starting at block {} (cursor {})",
        sinker.resume_from(),
        cursor
    );

    let source = JsonLinesSource::open(events_file)
        .with_context(|| format!("Failed to open {}", events_file.display()))?;
    let serving = service != ServiceKind::Disabled;
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(run_service(
        service,
        reader,
        config.request_timeout_ms,
        async move {
            let _ = shutdown_rx.await;
        },
    ));

    let stop = sinker.stop_handle();
    let mut sink_task = tokio::task::spawn_blocking(move || sinker.run(source));
    let mut interrupted = false;
    let result = tokio::select! {
        result = &mut sink_task => result,
        _ = signal::ctrl_c() => {
            tracing::info!("Interrupted, finishing the current block");
            interrupted = true;
            stop.store(true, Ordering::Release);
            sink_task.await
        }
    };
    result.context("Sinker task panicked")??;
    tracing::info!("Event file applied");

    if serving && !interrupted {
        tracing::info!("Serving queries until interrupted");
        signal::ctrl_c().await?;
    }
    let _ = shutdown_tx.send(());
    server.await.context("Query server task panicked")??;
    Ok(())
}

async fn serve(
    config: SinkConfig,
    query: &QueryArgs,
    listen_addr: std::net::SocketAddr,
) -> anyhow::Result<()> {
    let store = open_store(&config)?;
    let reader: Arc<dyn Reader> = Arc::new(KvReader::new(store, config.query_rows_limit));
    let service = ServiceKind::Rest {
        listen_addr,
        api_prefix: query.api_prefix.clone(),
    };

    run_service(service, reader, config.request_timeout_ms, async {
        let _ = signal::ctrl_c().await;
    })
    .await?;
    Ok(())
}

fn inspect(config: SinkConfig) -> anyhow::Result<()> {
    let store = open_store(&config)?;
    let db = OperationDb::new(store.clone(), &config);

    match db.get_cursor() {
        Ok(cursor) => println!(
            "cursor: block {} id '{}' token '{}'",
            cursor.block_number, cursor.block_id, cursor.token
        ),
        Err(SinkError::CursorNotFound) => println!("cursor: none"),
        Err(e) => return Err(e.into()),
    }

    let undo_blocks = db.undo_block_numbers()?;
    println!("undo records: {}", undo_blocks.len());
    for block in undo_blocks {
        println!("  block {}", block);
    }

    let user_keys = store
        .keys()
        .iter()
        .filter(|key| kv_sink_core::key::is_user_key(key))
        .count();
    println!("user records: {}", user_keys);
    Ok(())
}
