//! Ingestion counters owned by the block handler.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::Serialize;

/// Counters updated by the single writer and read by the reporter.
#[derive(Debug, Default)]
pub struct Stats {
    blocks: AtomicU64,
    flushes: AtomicU64,
    flushed_entries: AtomicU64,
    undo_replays: AtomicU64,
    replayed_blocks: AtomicU64,
    last_block: AtomicU64,
    finalized_height: AtomicU64,
    flush_micros: AtomicU64,
}

/// Point-in-time copy of [`Stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatsSnapshot {
    pub blocks: u64,
    pub flushes: u64,
    pub flushed_entries: u64,
    pub undo_replays: u64,
    pub replayed_blocks: u64,
    pub last_block: u64,
    pub finalized_height: u64,
    pub flush_micros: u64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_block(&self, block: u64, finalized_height: u64) {
        self.blocks.fetch_add(1, Ordering::Relaxed);
        self.last_block.store(block, Ordering::Relaxed);
        self.finalized_height
            .store(finalized_height, Ordering::Relaxed);
    }

    pub fn record_flush(&self, entries: usize, elapsed: Duration) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.flushed_entries
            .fetch_add(entries as u64, Ordering::Relaxed);
        self.flush_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_undo(&self, last_valid_block: u64, replayed_blocks: usize) {
        self.undo_replays.fetch_add(1, Ordering::Relaxed);
        self.replayed_blocks
            .fetch_add(replayed_blocks as u64, Ordering::Relaxed);
        self.last_block.store(last_valid_block, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            blocks: self.blocks.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            flushed_entries: self.flushed_entries.load(Ordering::Relaxed),
            undo_replays: self.undo_replays.load(Ordering::Relaxed),
            replayed_blocks: self.replayed_blocks.load(Ordering::Relaxed),
            last_block: self.last_block.load(Ordering::Relaxed),
            finalized_height: self.finalized_height.load(Ordering::Relaxed),
            flush_micros: self.flush_micros.load(Ordering::Relaxed),
        }
    }

    /// Emits the current counters as one log line.
    pub fn log_now(&self) {
        let s = self.snapshot();
        tracing::info!(
            blocks = s.blocks,
            last_block = s.last_block,
            finalized_height = s.finalized_height,
            flushes = s.flushes,
            flushed_entries = s.flushed_entries,
            undo_replays = s.undo_replays,
            replayed_blocks = s.replayed_blocks,
            flush_ms = s.flush_micros / 1000,
            "sink stats"
        );
    }
}

/// Background thread logging [`Stats`] every interval until stopped.
#[derive(Debug)]
pub struct StatsReporter {
    stop_tx: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl StatsReporter {
    pub fn start(stats: Arc<Stats>, interval: Duration) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("sink-stats".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(mpsc::RecvTimeoutError::Timeout) => stats.log_now(),
                    _ => break,
                }
            });

        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!("Failed to start stats reporter: {}", e);
                None
            }
        };

        Self {
            stop_tx: Some(stop_tx),
            handle,
        }
    }

    /// Stops the thread and waits for it to exit.
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("Stats reporter thread panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for StatsReporter {
    fn drop(&mut self) {
        self.stop();
    }
}
