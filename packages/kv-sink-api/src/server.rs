//! Hyper server setup and request handling.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming as IncomingBody};
use hyper::{Request, Response, Result as HyperResult};
use hyper_util::rt::TokioExecutor;
use hyper_util::rt::TokioIo;
use hyper_util::server::conn::auto::Builder as ConnectionBuilder;
use tokio::net::TcpListener;

use crate::router::Router;
use kv_sink_core::Reader;

/// Query service selected once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceKind {
    /// REST query server
    Rest {
        listen_addr: SocketAddr,
        api_prefix: Option<String>,
    },
    /// No query server
    Disabled,
}

impl ServiceKind {
    pub fn from_args(listen_addr: Option<SocketAddr>, api_prefix: Option<String>) -> Self {
        match listen_addr {
            Some(listen_addr) => ServiceKind::Rest {
                listen_addr,
                api_prefix,
            },
            None => ServiceKind::Disabled,
        }
    }
}

/// HTTP server for the query API.
pub struct Server {
    listener: TcpListener,
    router: Arc<Router>,
}

impl Server {
    /// Binds `addr`. Port 0 picks a free port.
    pub async fn bind(addr: SocketAddr, router: Router) -> Result<Self, std::io::Error> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            router: Arc::new(router),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    /// Accepts connections until `shutdown` resolves.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()>,
    {
        tracing::info!("Query server listening on http://{}", self.local_addr()?);
        tokio::pin!(shutdown);

        loop {
            let (stream, _) = tokio::select! {
                accepted = self.listener.accept() => accepted?,
                _ = &mut shutdown => {
                    tracing::info!("Query server shutting down");
                    return Ok(());
                }
            };
            let io = TokioIo::new(stream);
            let router = Arc::clone(&self.router);

            tokio::task::spawn(async move {
                let builder = ConnectionBuilder::new(TokioExecutor::new());
                if let Err(err) = builder
                    .serve_connection(
                        io,
                        hyper::service::service_fn(move |req| handle_request(req, router.clone())),
                    )
                    .await
                {
                    tracing::debug!("Error serving connection: {}", err);
                }
            });
        }
    }
}

/// Handles an incoming HTTP request.
async fn handle_request(
    req: Request<IncomingBody>,
    router: Arc<Router>,
) -> HyperResult<Response<Full<Bytes>>> {
    let response = match router.route(req).await {
        Ok(response) => response,
        Err(err) => {
            tracing::debug!("Request failed: {}", err);
            Response::from(err)
        }
    };
    Ok(response.map(Full::new))
}

/// Runs the selected service until `shutdown` resolves.
pub async fn run_service<F>(
    kind: ServiceKind,
    reader: Arc<dyn Reader>,
    request_timeout_ms: u64,
    shutdown: F,
) -> Result<(), std::io::Error>
where
    F: Future<Output = ()>,
{
    match kind {
        ServiceKind::Rest {
            listen_addr,
            api_prefix,
        } => {
            let router = Router::new(reader, api_prefix.as_deref(), request_timeout_ms)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
            Server::bind(listen_addr, router).await?.serve(shutdown).await
        }
        ServiceKind::Disabled => {
            tracing::info!("Query server disabled");
            Ok(())
        }
    }
}
