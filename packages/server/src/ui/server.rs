//! Server execution logic.

use std::{future::Future, io, sync::Arc};

use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::usecase::ConnectionHub;

use super::{
    handler::{health_check, list_connections, websocket_handler},
    signal::shutdown_signal,
    state::AppState,
};

/// Build the application router around a hub
pub fn build_router(hub: Arc<ConnectionHub>) -> Router {
    let app_state = Arc::new(AppState { hub });

    Router::new()
        // WebSocket エンドポイント
        .route("/ws", get(websocket_handler))
        // HTTP エンドポイント
        .route("/api/health", get(health_check))
        .route("/api/connections", get(list_connections))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// WebSocket chat relay server
///
/// # Example
///
/// ```ignore
/// let hub = Arc::new(ConnectionHub::new(Arc::new(SystemClock)));
/// Server::new(hub).run("127.0.0.1:8080").await?;
/// ```
pub struct Server {
    hub: Arc<ConnectionHub>,
}

impl Server {
    pub fn new(hub: Arc<ConnectionHub>) -> Self {
        Self { hub }
    }

    /// Bind to `bind_addr` and serve until Ctrl+C or SIGTERM
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address or
    /// if there's an error during server execution.
    pub async fn run(self, bind_addr: &str) -> io::Result<()> {
        let listener = TcpListener::bind(bind_addr).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener.local_addr()?;
        tracing::info!("WebSocket chat relay listening on {}", local_addr);
        tracing::info!("Connect to: ws://{}/ws", local_addr);

        axum::serve(listener, build_router(self.hub))
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}
