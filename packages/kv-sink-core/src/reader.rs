//! Read path over committed state.
//!
//! Readers never see the change buffer: only what a flush has written to the
//! store is visible.

use std::sync::Arc;

use crate::error::{Result, SinkError};
use crate::key::{from_user_key, is_user_key, user_key, INFINITE_END_BYTES};
use crate::operation::KeyValue;
use crate::store::{KvPair, KvStore};

/// One page of a bounded query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Page {
    pub values: Vec<KeyValue>,
    /// More matching records exist past the last returned one
    pub limit_reached: bool,
}

/// Queries over committed user records.
pub trait Reader: Send + Sync {
    /// Fails with `NotFound` if `key` is absent.
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Values for `keys`, in input order. Fails with `NotFound` if any key is
    /// absent and `InvalidArguments` if `keys` is empty.
    fn get_many(&self, keys: &[String]) -> Result<Vec<Vec<u8>>>;

    /// Up to `limit` records whose key starts with `prefix`.
    fn get_by_prefix(&self, prefix: &str, limit: usize) -> Result<Page>;

    /// Up to `limit` records in `[begin, exclusive_end)`. An empty
    /// `exclusive_end` is open-ended.
    fn scan(&self, begin: &str, exclusive_end: &str, limit: usize) -> Result<Page>;

    /// Largest accepted `limit`.
    fn query_rows_limit(&self) -> usize;
}

/// [`Reader`] backed by a [`KvStore`].
#[derive(Debug)]
pub struct KvReader<S> {
    store: Arc<S>,
    query_rows_limit: usize,
}

impl<S> Clone for KvReader<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            query_rows_limit: self.query_rows_limit,
        }
    }
}

impl<S: KvStore> KvReader<S> {
    pub fn new(store: Arc<S>, query_rows_limit: usize) -> Self {
        Self {
            store,
            query_rows_limit,
        }
    }

    fn check_limit(&self, limit: usize) -> Result<()> {
        if limit < 1 || limit > self.query_rows_limit {
            return Err(SinkError::InvalidArguments(format!(
                "limit must be between 1 and {}, got {}",
                self.query_rows_limit, limit
            )));
        }
        Ok(())
    }
}

fn into_page(pairs: Vec<KvPair>, limit: usize) -> Result<Page> {
    if pairs.is_empty() {
        return Err(SinkError::NotFound);
    }
    let limit_reached = pairs.len() > limit;
    let values = pairs
        .into_iter()
        .take(limit)
        .map(|pair| KeyValue {
            key: from_user_key(&pair.key),
            value: pair.value,
        })
        .collect();
    Ok(Page {
        values,
        limit_reached,
    })
}

impl<S: KvStore> Reader for KvReader<S> {
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.store.get(&user_key(key))?.ok_or(SinkError::NotFound)
    }

    fn get_many(&self, keys: &[String]) -> Result<Vec<Vec<u8>>> {
        if keys.is_empty() {
            return Err(SinkError::InvalidArguments(
                "keys must not be empty".to_string(),
            ));
        }

        let encoded: Vec<Vec<u8>> = keys.iter().map(|k| user_key(k)).collect();
        self.store
            .batch_get(&encoded)?
            .into_iter()
            .map(|value| value.ok_or(SinkError::NotFound))
            .collect()
    }

    fn get_by_prefix(&self, prefix: &str, limit: usize) -> Result<Page> {
        if prefix.is_empty() {
            return Err(SinkError::InvalidArguments(
                "prefix must not be empty".to_string(),
            ));
        }
        self.check_limit(limit)?;

        let pairs = self.store.prefix(&user_key(prefix), limit + 1)?;
        into_page(pairs, limit)
    }

    fn scan(&self, begin: &str, exclusive_end: &str, limit: usize) -> Result<Page> {
        self.check_limit(limit)?;

        let end = if exclusive_end.is_empty() {
            INFINITE_END_BYTES.to_vec()
        } else {
            user_key(exclusive_end)
        };

        // Non-user keys sort inside an open-ended range, so keep reading
        // until limit + 1 user records are found or the range is exhausted.
        let mut start = user_key(begin);
        let mut pairs = Vec::with_capacity(limit + 1);
        loop {
            let want = limit + 1 - pairs.len();
            let batch = self.store.scan(&start, &end, want)?;
            let exhausted = batch.len() < want;

            if let Some(last) = batch.last() {
                start = last.key.clone();
                start.push(0);
            }
            for pair in batch {
                if is_user_key(&pair.key) {
                    pairs.push(pair);
                } else {
                    tracing::debug!("Skipping non-user key during scan: {:?}", pair.key);
                }
            }

            if exhausted || pairs.len() > limit {
                break;
            }
        }

        into_page(pairs, limit)
    }

    fn query_rows_limit(&self) -> usize {
        self.query_rows_limit
    }
}
