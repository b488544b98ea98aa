//! Matchit routing configuration.

use std::sync::Arc;

use hyper::{body::Bytes, Method, Request, Response};
use matchit::Router as MatchitRouter;

use crate::handlers;
use kv_sink_core::Reader;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Read path over committed state
    pub reader: Arc<dyn Reader>,
    /// Default and maximum `limit`
    pub query_rows_limit: usize,
    pub request_timeout_ms: u64,
}

/// HTTP request router.
pub struct Router {
    inner: MatchitRouter<RouteHandler>,
    state: AppState,
}

impl Router {
    /// Creates a router serving every route under `/<api_prefix>`.
    pub fn new(
        reader: Arc<dyn Reader>,
        api_prefix: Option<&str>,
        request_timeout_ms: u64,
    ) -> Result<Self, RouterError> {
        let prefix = normalize_prefix(api_prefix);
        let routes = [
            ("/health", RouteHandler::Health),
            ("/kv/get", RouteHandler::Get),
            ("/kv/get_many", RouteHandler::GetMany),
            ("/kv/prefix", RouteHandler::Prefix),
            ("/kv/scan", RouteHandler::Scan),
        ];

        let mut router = MatchitRouter::new();
        for (path, handler) in routes {
            let full = format!("{}{}", prefix, path);
            router.insert(full.as_str(), handler).map_err(|e| {
                RouterError::InternalError(format!("Failed to insert {} route: {}", full, e))
            })?;
        }

        let query_rows_limit = reader.query_rows_limit();
        Ok(Self {
            inner: router,
            state: AppState {
                reader,
                query_rows_limit,
                request_timeout_ms,
            },
        })
    }

    /// Routes a request to its handler. Only `GET` is served.
    pub async fn route<B>(&self, req: Request<B>) -> Result<Response<Bytes>, RouterError> {
        let path = req.uri().path().to_string();

        match self.inner.at(&path) {
            Ok(matched) => {
                if req.method() != Method::GET {
                    return Err(RouterError::MethodNotAllowed);
                }
                matched.value.handle(req.uri().query(), &self.state).await
            }
            Err(_) => Err(RouterError::NotFound(format!("No route found for {}", path))),
        }
    }
}

fn normalize_prefix(prefix: Option<&str>) -> String {
    match prefix.map(|p| p.trim_matches('/')) {
        Some(p) if !p.is_empty() => format!("/{}", p),
        _ => String::new(),
    }
}

/// Route handler function.
enum RouteHandler {
    Health,
    Get,
    GetMany,
    Prefix,
    Scan,
}

impl RouteHandler {
    async fn handle(
        &self,
        query: Option<&str>,
        state: &AppState,
    ) -> Result<Response<Bytes>, RouterError> {
        match self {
            RouteHandler::Health => handlers::health(query, state).await,
            RouteHandler::Get => handlers::get(query, state).await,
            RouteHandler::GetMany => handlers::get_many(query, state).await,
            RouteHandler::Prefix => handlers::prefix(query, state).await,
            RouteHandler::Scan => handlers::scan(query, state).await,
        }
    }
}

/// Router error type.
#[derive(Debug)]
pub enum RouterError {
    MethodNotAllowed,
    InternalError(String),
    Timeout,
    BadRequest(String),
    NotFound(String),
}

impl std::fmt::Display for RouterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouterError::MethodNotAllowed => write!(f, "Method Not Allowed"),
            RouterError::InternalError(msg) => write!(f, "Internal Error: {}", msg),
            RouterError::Timeout => write!(f, "Request Timeout"),
            RouterError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            RouterError::NotFound(msg) => write!(f, "Not Found: {}", msg),
        }
    }
}

impl std::error::Error for RouterError {}

impl RouterError {
    pub fn status(&self) -> u16 {
        match self {
            RouterError::MethodNotAllowed => 405,
            RouterError::InternalError(_) => 500,
            RouterError::Timeout => 408,
            RouterError::BadRequest(_) => 400,
            RouterError::NotFound(_) => 404,
        }
    }
}

impl From<RouterError> for Response<Bytes> {
    fn from(err: RouterError) -> Self {
        let status = err.status();
        let message = match &err {
            RouterError::MethodNotAllowed => "Method Not Allowed",
            RouterError::Timeout => "Request Timeout",
            RouterError::InternalError(_) => "internal server error",
            RouterError::BadRequest(msg) | RouterError::NotFound(msg) => msg.as_str(),
        };

        let error_response = handlers::error_response(status, message.to_string(), None);
        let body = serde_json::to_vec(&error_response).unwrap_or_else(|_| {
            br#"{"success":false,"error":{"code":"500","message":"internal server error"}}"#
                .to_vec()
        });

        let mut response = Response::new(Bytes::from(body));
        *response.status_mut() =
            hyper::StatusCode::from_u16(status).unwrap_or(hyper::StatusCode::INTERNAL_SERVER_ERROR);
        response.headers_mut().insert(
            hyper::header::CONTENT_TYPE,
            hyper::header::HeaderValue::from_static("application/json"),
        );
        response
    }
}
