//! Chat Server
//!
//! HTTP and WebSocket layer for the broadcast hub, built with Axum.
//!
//! # Endpoints
//!
//! - `GET /ws/:client_id` - Chat connection; every message is broadcast to
//!   all connections and answered privately by the bot
//! - `GET /relay/:client_id` - Echo relay; replies only, no broadcast
//! - `GET /health` - Health status
//!
//! Both socket routes accept a `token` query parameter which is logged but
//! not validated.
//!
//! # Example
//!
//! ```rust,no_run
//! use chatwire::config::RelayConfig;
//! use chatwire::server::{serve, AppState, HubConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let state = AppState::new(HubConfig::default(), RelayConfig::default());
//!     serve(state, "0.0.0.0:5555").await?;
//!     Ok(())
//! }
//! ```

mod error;
mod handler;
mod health;
mod hub;
mod relay;
mod state;

pub use error::{ServerError, ServerResult};
pub use handler::{chat_handler, relay_handler, ConnectParams};
pub use health::HealthResponse;
pub use hub::{BroadcastHub, ConnectionHandle, ConnectionId, HubConfig, HubError, RouteOutcome};
pub use relay::EchoRelay;
pub use state::AppState;

use axum::{routing::get, Router};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Build the router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let shared_state = Arc::new(state);

    Router::new()
        .route("/ws/:client_id", get(handler::chat_handler))
        .route("/relay/:client_id", get(handler::relay_handler))
        .route("/health", get(health::health))
        .layer(TraceLayer::new_for_http())
        .with_state(shared_state)
}

/// Bind `addr` and serve until Ctrl+C or SIGTERM
pub async fn serve(state: AppState, addr: &str) -> ServerResult<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })?;

    serve_on(listener, state, shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` resolves
pub async fn serve_on<F>(listener: TcpListener, state: AppState, shutdown: F) -> ServerResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let router = build_router(state);

    match listener.local_addr() {
        Ok(addr) => tracing::info!("Chat server listening on {}", addr),
        Err(_) => tracing::info!("Chat server listening"),
    }

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Chat server shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
