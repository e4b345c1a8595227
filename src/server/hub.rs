//! Broadcast Hub
//!
//! Registry of accepted chat connections and the routing rules applied to
//! every inbound message. All registry access goes through one `RwLock`:
//! connect and disconnect take the write lock, routing holds the read lock
//! for the whole fan-out so no connection joins or leaves mid-broadcast.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::{mpsc, RwLock, RwLockWriteGuard};

use crate::message::{now_timestamp, Message, ParseError};

/// Accept-order identifier of a registered connection
pub type ConnectionId = u64;

/// Configuration for the broadcast hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Maximum number of concurrent connections
    pub max_connections: usize,
    /// Sender name stamped on replies
    pub bot_name: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_connections: 1000,
            bot_name: "Bot".to_string(),
        }
    }
}

/// Handle for sending messages to a specific connection
pub struct ConnectionHandle {
    /// Identifier from the connection URL
    pub client_id: String,
    /// Channel drained by the connection's writer task
    pub sender: mpsc::UnboundedSender<Message>,
}

/// What happened to one routed message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteOutcome {
    /// Connections the broadcast reached
    pub delivered: usize,
    /// Whether the sender got its reply
    pub replied: bool,
}

/// Manages all chat connections
pub struct BroadcastHub {
    connections: RwLock<BTreeMap<ConnectionId, ConnectionHandle>>,
    next_id: AtomicU64,
    config: HubConfig,
}

impl BroadcastHub {
    /// Create a new hub
    pub fn new(config: HubConfig) -> Self {
        Self {
            connections: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            config,
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Register an accepted connection
    ///
    /// Returns the connection ID on success, or an error if the connection
    /// limit has been reached.
    pub async fn on_connect(
        &self,
        client_id: &str,
        sender: mpsc::UnboundedSender<Message>,
    ) -> Result<ConnectionId, HubError> {
        let mut connections = self.connections.write().await;
        if connections.len() >= self.config.max_connections {
            return Err(HubError::TooManyConnections(self.config.max_connections));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        connections.insert(
            id,
            ConnectionHandle {
                client_id: client_id.to_string(),
                sender,
            },
        );

        tracing::info!(connection_id = id, client_id = %client_id, "Chat connected");
        Ok(id)
    }

    /// Remove a connection and tell everyone left
    ///
    /// Returns the departure notice, or `None` if the connection was not
    /// registered.
    pub async fn on_disconnect(&self, id: ConnectionId) -> Option<Message> {
        let mut connections = self.connections.write().await;
        let handle = connections.remove(&id)?;
        let connections = RwLockWriteGuard::downgrade(connections);

        tracing::info!(connection_id = id, client_id = %handle.client_id, "Chat disconnected");

        let notice = departure_envelope(&handle.client_id);
        let delivered = fan_out(connections.values(), &notice);
        tracing::debug!(client_id = %handle.client_id, delivered, "Departure broadcast");

        Some(notice)
    }

    /// Decode a raw frame from `id` and route it
    ///
    /// The broadcast goes to every connection including the sender; the
    /// reply goes to the sender alone. Each is attempted regardless of how
    /// the other went.
    pub async fn on_message(&self, id: ConnectionId, raw: &[u8]) -> Result<RouteOutcome, HubError> {
        let message = Message::decode(raw)?;

        let connections = self.connections.read().await;
        let origin = connections.get(&id).ok_or(HubError::ConnectionNotFound)?;

        let announcement = broadcast_envelope(&origin.client_id, &message);
        let delivered = fan_out(connections.values(), &announcement);

        let reply = reply_envelope(&self.config.bot_name, message);
        let replied = origin.sender.send(reply).is_ok();
        if !replied {
            tracing::debug!(connection_id = id, "Reply dropped, connection is closing");
        }

        tracing::trace!(connection_id = id, delivered, replied, "Message routed");
        Ok(RouteOutcome { delivered, replied })
    }

    /// Get the current connection count
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

fn fan_out<'a>(handles: impl Iterator<Item = &'a ConnectionHandle>, message: &Message) -> usize {
    handles
        .filter(|handle| handle.sender.send(message.clone()).is_ok())
        .count()
}

/// `#{client_id}:{text}` from the system sender, stamped now
pub(crate) fn broadcast_envelope(client_id: &str, original: &Message) -> Message {
    Message {
        text: format!("#{}:{}", client_id, original.text),
        created_at: now_timestamp(),
        ..Default::default()
    }
}

/// The original envelope re-signed by the bot with a `reply: ` prefix
pub(crate) fn reply_envelope(bot_name: &str, original: Message) -> Message {
    Message {
        sender: bot_name.to_string(),
        text: format!("reply: {}", original.text),
        created_at: now_timestamp(),
        ..original
    }
}

pub(crate) fn departure_envelope(client_id: &str) -> Message {
    Message::system(format!("#{} left the chat", client_id))
}

/// Errors that can occur in the broadcast hub
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Too many connections (limit: {0})")]
    TooManyConnections(usize),

    #[error("Connection not found")]
    ConnectionNotFound,

    #[error(transparent)]
    Parse(#[from] ParseError),
}
