//! # Chatwire
//!
//! WebSocket chat plumbing: a reconnecting client and a broadcast server
//! sharing one JSON message envelope.
//!
//! ## Features
//!
//! - **Resilient client**: outgoing and incoming queues that survive
//!   reconnects, with keepalive probes and a configurable retry policy
//! - **Broadcast hub**: every message fans out to all connected clients,
//!   plus a private bot reply to the sender
//! - **Echo relay**: single-socket reply service for testing clients
//! - **UI directives**: server-pushed actions dispatched through a typed
//!   handler trait
//!
//! ## Modules
//!
//! - [`message`]: Envelope, wire codec and directive dispatch
//! - [`transport`]: Connection abstraction and its WebSocket implementation
//! - [`client`]: Connection supervisor and application adapters
//! - [`server`]: Broadcast hub, echo relay and the Axum router
//! - [`config`]: TOML and environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chatwire::config::Config;
//! use chatwire::server::{serve, AppState};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_default();
//!     chatwire::logging::init(&config.logging)?;
//!
//!     let state = AppState::new(config.server.hub_config(), config.relay.clone());
//!     serve(state, &config.server.addr()).await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod logging;
pub mod message;
pub mod server;
pub mod transport;

// Re-export top-level types for convenience
pub use message::{Action, ActionHandler, Message, Notification, ParseError};

pub use client::{
    BridgedClient, ChatClient, ClientError, ConnectionState, ConnectionStatus, Supervisor,
    SupervisorConfig,
};

pub use transport::{Connector, Transport, TransportError, WsConnector};

pub use server::{build_router, serve, AppState, BroadcastHub, HubError, ServerError};

pub use config::{Config, ConfigError};
