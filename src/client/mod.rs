//! Chat Client
//!
//! A reconnecting connection supervisor that turns one unreliable socket into
//! two always-available queues.
//!
//! ## Architecture
//!
//! - **Supervisor**: reconnect loop, keepalive probes, send and receive pumps
//! - **Adapters**: [`ChatClient`] for async callers on the same runtime,
//!   [`BridgedClient`] for synchronous callers on another thread
//! - **Policy**: timeouts and the retry/backoff policy
//!
//! ## Example
//!
//! ```rust,no_run
//! use chatwire::client::{Supervisor, SupervisorConfig};
//! use chatwire::message::Message;
//! use chatwire::transport::WsConnector;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SupervisorConfig::new("ws://localhost:5555/ws/bob?token=test_token");
//!     let (supervisor, mut client) = Supervisor::new(config, Arc::new(WsConnector));
//!     tokio::spawn(supervisor.run());
//!
//!     client.asend(Message::new("bob", "hello")).await?;
//!     let reply = client.arecv().await?;
//!     println!("{}", reply);
//!     Ok(())
//! }
//! ```

mod adapter;
mod policy;
mod state;
mod supervisor;

pub use adapter::{BridgedClient, ChatClient};
pub use policy::{Backoff, RetryPolicy, SupervisorConfig};
pub use state::{ConnectionState, ConnectionStatus};
pub use supervisor::{InboundHook, Supervisor};

use crate::transport::TransportError;
use thiserror::Error;

/// Errors surfaced to client applications
#[derive(Debug, Error)]
pub enum ClientError {
    /// The supervisor has exited and its queues are closed
    #[error("Connection supervisor has stopped")]
    SupervisorGone,

    #[error("Gave up after {attempts} failed connection attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Failed to start supervisor worker: {0}")]
    Worker(#[source] std::io::Error),

    #[error("Supervisor worker panicked")]
    WorkerPanicked,
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
