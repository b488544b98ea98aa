//! Request utilities for HTTP endpoints.

use std::time::Duration;

use hyper::{body::Bytes, Response};
use kv_sink_core::SinkError;
use percent_encoding::percent_decode_str;
use serde::Serialize;

use super::response::success_response;
use crate::router::{AppState, RouterError};

/// Decoded query string pairs, in order. Repeated keys are kept.
#[derive(Debug, Default)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Parses a URL query string. Pairs without `=` get an empty value.
    pub fn parse(query: Option<&str>) -> Self {
        let pairs = query
            .unwrap_or("")
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                (decode(key), decode(value))
            })
            .collect();
        Self { pairs }
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value for `key`, in order.
    pub fn get_all(&self, key: &str) -> Vec<String> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .collect()
    }

    pub fn require(&self, key: &str) -> Result<&str, RouterError> {
        self.get(key)
            .ok_or_else(|| RouterError::BadRequest(format!("Missing query parameter '{}'", key)))
    }

    /// `limit` parameter. Absent or `0` means `default`.
    pub fn limit(&self, default: usize) -> Result<usize, RouterError> {
        match self.get("limit") {
            None | Some("") => Ok(default),
            Some(raw) => {
                let limit: usize = raw.parse().map_err(|e| {
                    RouterError::BadRequest(format!("Invalid limit value '{}': {}", raw, e))
                })?;
                Ok(if limit == 0 { default } else { limit })
            }
        }
    }
}

fn decode(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

/// Maps a read path error to the HTTP error it is served as.
///
/// Only `NotFound` and `InvalidArguments` carry detail to the client.
pub fn map_sink_error_to_router_error(e: SinkError) -> RouterError {
    match e {
        SinkError::NotFound => RouterError::NotFound("not found".to_string()),
        SinkError::InvalidArguments(msg) => RouterError::BadRequest(msg),
        other => internal_error("Query failed", other),
    }
}

/// Logs `detail` and returns the generic 500 error served to clients.
pub fn internal_error(context: &str, detail: impl std::fmt::Display) -> RouterError {
    tracing::error!("{}: {}", context, detail);
    RouterError::InternalError("internal server error".to_string())
}

/// Runs a blocking read path query off the async workers, bounded by the
/// request timeout.
pub async fn run_query<T, F>(state: &AppState, query: F) -> Result<T, RouterError>
where
    T: Send + 'static,
    F: FnOnce(&dyn kv_sink_core::Reader) -> Result<T, SinkError> + Send + 'static,
{
    let reader = state.reader.clone();
    let task = tokio::task::spawn_blocking(move || query(reader.as_ref()));
    let timeout = Duration::from_millis(state.request_timeout_ms);

    tokio::time::timeout(timeout, task)
        .await
        .map_err(|_| RouterError::Timeout)?
        .map_err(|e| internal_error("Query task failed", e))?
        .map_err(map_sink_error_to_router_error)
}

/// Serializes `data` in the success envelope.
pub fn json_response<T: Serialize>(data: T) -> Result<Response<Bytes>, RouterError> {
    let body = serde_json::to_vec(&success_response(data))
        .map_err(|e| internal_error("Failed to serialize response", e))?;
    build_response(200, body)
}

pub fn build_response(status: u16, json: Vec<u8>) -> Result<Response<Bytes>, RouterError> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Bytes::from(json))
        .map_err(|e| internal_error("Failed to build response", e))
}
