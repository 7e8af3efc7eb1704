//! HTTP interface: the `/metrics` scrape endpoint

use anyhow::Result;
use axum::{Router, routing::get};
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::metrics::ViewerMetrics;

pub mod handlers;

/// Web server configuration and setup
pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(addr: SocketAddr, metrics: ViewerMetrics) -> Self {
        Self {
            app: Self::router(metrics),
            addr,
        }
    }

    pub fn router(metrics: ViewerMetrics) -> Router {
        Router::new()
            .route("/metrics", get(handlers::metrics))
            .route("/health", get(handlers::health))
            .with_state(metrics)
    }

    /// Serve until `cancellation_token` fires.
    ///
    /// `ready_signal` receives the bound address once listening, or the bind
    /// error, before any request is served.
    pub async fn serve_with_cancellation(
        self,
        ready_signal: tokio::sync::oneshot::Sender<Result<SocketAddr>>,
        cancellation_token: CancellationToken,
    ) -> Result<()> {
        match tokio::net::TcpListener::bind(&self.addr).await {
            Ok(listener) => {
                let local_addr = listener.local_addr()?;
                let _ = ready_signal.send(Ok(local_addr));

                let shutdown_signal = async move {
                    cancellation_token.cancelled().await;
                    info!("Web server received cancellation signal, shutting down gracefully");
                };

                axum::serve(listener, self.app)
                    .with_graceful_shutdown(shutdown_signal)
                    .await?;
                Ok(())
            }
            Err(bind_error) => {
                let bind_err_msg = format!("Failed to bind to {}: {}", self.addr, bind_error);
                let _ = ready_signal.send(Err(anyhow::anyhow!("{}", bind_err_msg)));
                Err(anyhow::anyhow!("{}", bind_err_msg))
            }
        }
    }
}
