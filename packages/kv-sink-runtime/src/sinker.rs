//! Block handler: applies data and fork events to the operation log.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use kv_sink_core::store::retry_store_operation;
use kv_sink_core::{Cursor, KvStore, OperationBatch, OperationDb, SinkConfig, SinkError};

use crate::block::BlockEvent;
use crate::stats::{Stats, StatsReporter};
use crate::Result;

/// Single writer over an [`OperationDb`].
///
/// Events must arrive in stream order. Data blocks below the resume point
/// recorded in the cursor are skipped, so a source can be replayed from the
/// beginning after a restart.
pub struct Sinker<S: KvStore> {
    db: OperationDb<S>,
    config: SinkConfig,
    stats: Arc<Stats>,
    stop: Arc<AtomicBool>,
    reporter: Option<StatsReporter>,
    /// Finalized height reported by the previous data block
    last_finalized: Option<u64>,
    /// Cursor of the last applied event
    last_cursor: Option<Cursor>,
    resume_from: u64,
    caught_up: bool,
}

impl<S: KvStore> Sinker<S> {
    pub fn new(db: OperationDb<S>, config: SinkConfig) -> Self {
        Self {
            db,
            resume_from: config.start_block,
            config,
            stats: Arc::new(Stats::new()),
            stop: Arc::new(AtomicBool::new(false)),
            reporter: None,
            last_finalized: None,
            last_cursor: None,
            caught_up: false,
        }
    }

    pub fn db(&self) -> &OperationDb<S> {
        &self.db
    }

    pub fn stats(&self) -> Arc<Stats> {
        self.stats.clone()
    }

    /// Flag that stops [`Sinker::run`] between two events.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// First block that will be applied.
    pub fn resume_from(&self) -> u64 {
        self.resume_from
    }

    /// Loads the cursor, creating a blank one on first run, and starts the
    /// stats reporter. Returns the cursor to resume the upstream stream from.
    pub fn start(&mut self) -> Result<Cursor> {
        let cursor = match self.db.get_cursor() {
            Ok(cursor) => {
                self.resume_from = cursor.resume_block();
                tracing::info!(
                    "Resuming from cursor {} at block {}",
                    cursor,
                    self.resume_from
                );
                cursor
            }
            Err(SinkError::CursorNotFound) => {
                let cursor = Cursor::blank(self.config.start_block.saturating_sub(1));
                self.db.write_cursor(&cursor)?;
                self.resume_from = self.config.start_block;
                tracing::info!(
                    "No cursor found, starting from block {}",
                    self.config.start_block
                );
                cursor
            }
            Err(e) => return Err(e),
        };

        if self.reporter.is_none() {
            self.reporter = Some(StatsReporter::start(
                self.stats.clone(),
                self.config.stats_interval,
            ));
        }
        Ok(cursor)
    }

    /// Applies one data block.
    ///
    /// Purges undo history finalized by the previous block, records this
    /// block's inverse, buffers its operations and flushes when the block is
    /// on a flush boundary or still reorg-able. Transient store failures retry
    /// the failing step only, so the inverse is never recomputed against
    /// values this block already wrote.
    pub fn on_block_data(
        &mut self,
        block: u64,
        finalized_height: u64,
        operations: OperationBatch,
        cursor: &Cursor,
    ) -> Result<()> {
        if !self.caught_up {
            if block < self.resume_from {
                tracing::debug!("Skipping block {} below resume point", block);
                return Ok(());
            }
            self.caught_up = true;
        }

        let (retries, delay_ms) = self.retry_settings();
        if let Some(finalized) = self.last_finalized {
            let db = &self.db;
            retry_store_operation(|| db.purge_undo(finalized), retries, delay_ms, "purge_undo")?;
        }
        {
            let db = &self.db;
            retry_store_operation(
                || db.record_undo(block, &operations),
                retries,
                delay_ms,
                "record_undo",
            )?;
        }
        self.db.add_operations(operations);

        let interval = self.config.flush_interval_blocks.max(1);
        if block % interval == 0 || block > finalized_height {
            self.flush_with_retry(cursor)?;
        }

        self.last_finalized = Some(finalized_height);
        self.last_cursor = Some(cursor.clone());
        self.stats.record_block(block, finalized_height);
        Ok(())
    }

    /// Undoes every block above `last_valid_block`.
    ///
    /// Before the first data block after a restart, a fork at or above the
    /// stored cursor only concerns blocks that were never applied and is
    /// skipped. A deeper fork is applied, and ingestion then resumes right
    /// after `last_valid_block` so the re-delivered blocks are written.
    pub fn on_block_undo(&mut self, last_valid_block: u64, cursor: &Cursor) -> Result<()> {
        if !self.caught_up {
            if last_valid_block.saturating_add(1) >= self.resume_from {
                tracing::debug!(
                    "Skipping undo to block {} at or above resume point",
                    last_valid_block
                );
                return Ok(());
            }
            tracing::info!(
                "Fork to block {} below resume point {}",
                last_valid_block,
                self.resume_from
            );
        }

        let (retries, delay_ms) = self.retry_settings();
        let replayed = retry_store_operation(
            || self.db.replay_undo(last_valid_block),
            retries,
            delay_ms,
            "replay_undo",
        )?;
        self.flush_with_retry(cursor)?;
        {
            let db = &self.db;
            retry_store_operation(
                || db.discard_undo_above(last_valid_block),
                retries,
                delay_ms,
                "discard_undo_above",
            )?;
        }

        if !self.caught_up {
            self.resume_from = last_valid_block.saturating_add(1);
            self.caught_up = true;
        }
        self.last_cursor = Some(cursor.clone());
        self.stats.record_undo(last_valid_block, replayed);
        tracing::info!(
            "Undid {} blocks above block {}",
            replayed,
            last_valid_block
        );
        Ok(())
    }

    pub fn handle_event(&mut self, event: &BlockEvent) -> Result<()> {
        match event {
            BlockEvent::Data {
                block,
                finalized_height,
                operations,
                cursor,
            } => self.on_block_data(*block, *finalized_height, operations.clone(), cursor),
            BlockEvent::Undo {
                last_valid_block,
                cursor,
            } => self.on_block_undo(*last_valid_block, cursor),
        }
    }

    /// Applies events until the source ends, an event fails or the stop flag
    /// is set, then flushes what is buffered.
    ///
    /// Transient store failures are retried inside the failing step. Any
    /// other error stops the run and is returned. After a store failure the
    /// buffer may hold a partly applied event. It is left unflushed and the
    /// blocks since the stored cursor are re-delivered on restart.
    pub fn run<I>(&mut self, events: I) -> Result<()>
    where
        I: IntoIterator<Item = Result<BlockEvent>>,
    {
        let mut outcome = Ok(());
        for event in events {
            if self.stop.load(Ordering::Acquire) {
                tracing::info!("Stop requested, finishing");
                break;
            }

            let result = match event {
                Ok(event) => self.handle_event(&event),
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                tracing::error!("Failed to apply event: {}", e);
                outcome = Err(e);
                break;
            }
        }

        let shutdown = match &outcome {
            Err(e) if e.is_store_failure() => {
                tracing::warn!(
                    "Not flushing {} buffered changes after store failure",
                    self.db.pending_len()
                );
                self.stop_reporter();
                Ok(())
            }
            _ => self.shutdown(),
        };
        outcome.and(shutdown)
    }

    /// Flushes anything buffered with the last applied cursor and stops the
    /// stats reporter.
    pub fn shutdown(&mut self) -> Result<()> {
        let result = match self.last_cursor.clone() {
            Some(cursor) => self.flush_with_retry(&cursor).map(|_| ()),
            None => Ok(()),
        };
        self.stop_reporter();
        result
    }

    fn stop_reporter(&mut self) {
        if let Some(mut reporter) = self.reporter.take() {
            reporter.stop();
        }
        self.stats.log_now();
    }

    fn retry_settings(&self) -> (u32, u64) {
        (
            self.config.store_max_retries,
            self.config.store_retry_delay_ms,
        )
    }

    fn flush_with_retry(&mut self, cursor: &Cursor) -> Result<usize> {
        let (retries, delay_ms) = self.retry_settings();
        retry_store_operation(|| self.flush(cursor), retries, delay_ms, "flush")
    }

    fn flush(&mut self, cursor: &Cursor) -> Result<usize> {
        let start = Instant::now();
        let count = self.db.flush(cursor)?;
        let elapsed = start.elapsed();
        self.stats.record_flush(count, elapsed);
        tracing::debug!(
            "Flushed {} entries at block {} in {:?}",
            count,
            cursor.block_number,
            elapsed
        );
        Ok(count)
    }
}
