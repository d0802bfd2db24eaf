//! HTTP file server for the build output

use crate::error::{NodeserveError, NodeserveResult};
use axum::Router;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

/// A running file server
#[derive(Debug)]
pub struct FileServer {
    local_addr: SocketAddr,
    task: JoinHandle<std::io::Result<()>>,
}

impl FileServer {
    /// Serve `root` on every interface at `port` until `cancel` fires.
    ///
    /// Directories are answered with their `index.html`. Port 0 picks a
    /// free port; see [`FileServer::local_addr`].
    pub async fn start(root: &Path, port: u16, cancel: CancellationToken) -> NodeserveResult<Self> {
        let app = Router::new()
            .fallback_service(ServeDir::new(root))
            .layer(TraceLayer::new_for_http());

        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map_err(|source| NodeserveError::ServeBind { port, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| NodeserveError::io("reading listener address", e))?;
        info!("Serving {} on http://{}", root.display(), local_addr);

        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    cancel.cancelled().await;
                    debug!("File server shutting down");
                })
                .await
        });

        Ok(Self { local_addr, task })
    }

    /// Address the server is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the server to stop
    pub async fn wait(self) -> NodeserveResult<()> {
        self.task
            .await
            .map_err(|e| NodeserveError::Internal(format!("file server task failed: {}", e)))?
            .map_err(|e| NodeserveError::io("serving files", e))
    }
}
