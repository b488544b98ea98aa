//! Response types and helpers for HTTP endpoints.

use serde::Serialize;

/// Consistent API response wrapper for success responses
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// Always true for success responses
    pub success: bool,
    /// Response data
    pub data: T,
}

/// Consistent API error response wrapper
#[derive(Debug, Serialize)]
pub struct ApiError {
    /// HTTP status code as string
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Consistent error response wrapper
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Always false for error responses
    pub success: bool,
    pub error: ApiError,
}

/// A user record with its value hex-encoded.
#[derive(Debug, Serialize)]
pub struct KeyValueDto {
    pub key: String,
    pub value: String,
}

impl From<kv_sink_core::KeyValue> for KeyValueDto {
    fn from(kv: kv_sink_core::KeyValue) -> Self {
        Self {
            key: kv.key,
            value: hex::encode(kv.value),
        }
    }
}

/// One page of a prefix or range query.
#[derive(Debug, Serialize)]
pub struct PageDto {
    pub values: Vec<KeyValueDto>,
    pub limit_reached: bool,
}

impl From<kv_sink_core::Page> for PageDto {
    fn from(page: kv_sink_core::Page) -> Self {
        Self {
            values: page.values.into_iter().map(KeyValueDto::from).collect(),
            limit_reached: page.limit_reached,
        }
    }
}

pub fn success_response<T: Serialize>(data: T) -> ApiResponse<T> {
    ApiResponse {
        success: true,
        data,
    }
}

pub fn error_response(code: u16, message: String, details: Option<String>) -> ErrorResponse {
    ErrorResponse {
        success: false,
        error: ApiError {
            code: code.to_string(),
            message,
            details,
        },
    }
}
