//! HTTP endpoint implementations.

pub mod kv_handlers;
pub mod request_utils;
pub mod response;

pub use kv_handlers::{get, get_many, health, prefix, scan};
pub use response::{error_response, success_response, ApiError, ApiResponse, ErrorResponse};
