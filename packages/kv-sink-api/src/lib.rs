//! HTTP query server over the sink's read path.
//!
//! Serves committed state only: point, batch, prefix and range queries.

pub mod handlers;
pub mod router;
pub mod server;

pub use router::{Router, RouterError};
pub use server::{run_service, Server, ServiceKind};
