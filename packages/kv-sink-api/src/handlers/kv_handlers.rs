//! Read path endpoints.

use hyper::{body::Bytes, Response};
use serde::Serialize;

use super::request_utils::{json_response, run_query, QueryParams};
use super::response::{KeyValueDto, PageDto};
use crate::router::{AppState, RouterError};

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// `GET /health`
pub async fn health(_query: Option<&str>, _state: &AppState) -> Result<Response<Bytes>, RouterError> {
    json_response(HealthResponse { status: "ok" })
}

/// `GET /kv/get?key=K`
pub async fn get(query: Option<&str>, state: &AppState) -> Result<Response<Bytes>, RouterError> {
    let params = QueryParams::parse(query);
    let key = params.require("key")?.to_string();

    let lookup = key.clone();
    let value = run_query(state, move |reader| reader.get(&lookup)).await?;
    json_response(KeyValueDto {
        key,
        value: hex::encode(value),
    })
}

/// `GET /kv/get_many?keys=A&keys=B`
pub async fn get_many(
    query: Option<&str>,
    state: &AppState,
) -> Result<Response<Bytes>, RouterError> {
    let keys = QueryParams::parse(query).get_all("keys");

    let lookup = keys.clone();
    let values = run_query(state, move |reader| reader.get_many(&lookup)).await?;
    let data: Vec<KeyValueDto> = keys
        .into_iter()
        .zip(values)
        .map(|(key, value)| KeyValueDto {
            key,
            value: hex::encode(value),
        })
        .collect();
    json_response(data)
}

/// `GET /kv/prefix?prefix=P&limit=N`
pub async fn prefix(query: Option<&str>, state: &AppState) -> Result<Response<Bytes>, RouterError> {
    let params = QueryParams::parse(query);
    let prefix = params.require("prefix")?.to_string();
    let limit = params.limit(state.query_rows_limit)?;

    let page = run_query(state, move |reader| reader.get_by_prefix(&prefix, limit)).await?;
    json_response(PageDto::from(page))
}

/// `GET /kv/scan?begin=B&end=E&limit=N`
///
/// A missing or empty `end` scans to the end of the key space.
pub async fn scan(query: Option<&str>, state: &AppState) -> Result<Response<Bytes>, RouterError> {
    let params = QueryParams::parse(query);
    let begin = params.get("begin").unwrap_or("").to_string();
    let end = params.get("end").unwrap_or("").to_string();
    let limit = params.limit(state.query_rows_limit)?;

    let page = run_query(state, move |reader| reader.scan(&begin, &end, limit)).await?;
    json_response(PageDto::from(page))
}
