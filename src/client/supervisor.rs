//! Connection Supervisor
//!
//! Owns the transport across reconnects and bridges it to two unbounded
//! queues. While connected, a send pump and a receive pump run concurrently;
//! the first one to conclude the session is gone ends it for both.
//!
//! ```text
//! Disconnected -> Connecting -> Connected <-> ProbingKeepalive
//!       ^             |             |                |
//!       +--- backoff -+-------------+----------------+
//! ```

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use super::adapter::ChatClient;
use super::policy::SupervisorConfig;
use super::state::ConnectionState;
use super::ClientError;
use crate::message::{Message, Notification};
use crate::transport::{Connector, Transport, TransportError};

/// Called for every inbound message before it is queued
pub type InboundHook = Arc<dyn Fn(&Message, &Notification) + Send + Sync>;

/// Resilient client connection
pub struct Supervisor {
    config: SupervisorConfig,
    connector: Arc<dyn Connector>,
    outbound: mpsc::UnboundedReceiver<Message>,
    inbound: mpsc::UnboundedSender<Message>,
    /// Dequeued but not yet written; retried on the next session
    pending: Option<Message>,
    state: watch::Sender<ConnectionState>,
    hook: Option<InboundHook>,
    cancel: CancellationToken,
}

/// Why a connected session ended
#[derive(Debug)]
enum SessionEnd {
    /// Peer closed or a keepalive probe failed
    Lost,
    /// An unclassified transport error
    Failed(TransportError),
    /// `stop()` was called
    Stopped,
    /// The application dropped its end of the queues
    Abandoned,
}

impl Supervisor {
    /// Create a supervisor and the native client handle bound to its queues
    pub fn new(config: SupervisorConfig, connector: Arc<dyn Connector>) -> (Self, ChatClient) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let cancel = CancellationToken::new();

        let supervisor = Self {
            config,
            connector,
            outbound: outbound_rx,
            inbound: inbound_tx,
            pending: None,
            state: state_tx,
            hook: None,
            cancel: cancel.clone(),
        };
        let client = ChatClient::new(outbound_tx, inbound_rx, state_rx, cancel);

        (supervisor, client)
    }

    /// Install a hook observing every decoded inbound message
    pub fn with_hook(mut self, hook: InboundHook) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Run the reconnect loop
    ///
    /// Returns `Ok` once stopped or abandoned by the application, and an
    /// error only when the retry policy gives up.
    pub async fn run(mut self) -> Result<(), ClientError> {
        let mut failures: u32 = 0;

        loop {
            if self.cancel.is_cancelled() || self.inbound.is_closed() {
                break;
            }

            self.set_state(ConnectionState::Connecting);
            tracing::debug!(url = %self.config.url, attempt = failures + 1, "Connecting");

            let attempt = tokio::time::timeout(
                self.config.connect_timeout,
                self.connector.connect(&self.config.url),
            );
            let connected = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = attempt => result.unwrap_or_else(|_| {
                    Err(TransportError::Unreachable("connect timed out".to_string()))
                }),
            };

            match connected {
                Ok(transport) => {
                    failures = 0;
                    self.set_state(ConnectionState::Connected);
                    tracing::info!(url = %self.config.url, "Connected");

                    let end = self.run_session(transport.as_ref()).await;
                    transport.close().await;
                    self.set_state(ConnectionState::Disconnected);

                    match end {
                        SessionEnd::Stopped | SessionEnd::Abandoned => break,
                        SessionEnd::Lost => {
                            tracing::info!("Connection lost");
                        }
                        SessionEnd::Failed(e) => {
                            if !self.config.retry.retry_unclassified {
                                tracing::error!(error = %e, "Connection failed, stopping");
                                return Err(ClientError::Transport(e));
                            }
                            tracing::warn!(error = %e, "Connection failed");
                        }
                    }
                }
                Err(TransportError::Unreachable(reason)) => {
                    self.set_state(ConnectionState::Disconnected);
                    failures += 1;
                    tracing::warn!(reason = %reason, failures, "Server unreachable");
                }
                Err(e) => {
                    self.set_state(ConnectionState::Disconnected);
                    if !self.config.retry.retry_unclassified {
                        tracing::error!(error = %e, "Connect failed, stopping");
                        return Err(ClientError::Transport(e));
                    }
                    failures += 1;
                    tracing::warn!(error = %e, failures, "Connect failed");
                }
            }

            if self.config.retry.is_exhausted(failures) {
                tracing::error!(failures, "Giving up on connection");
                return Err(ClientError::RetriesExhausted { attempts: failures });
            }

            let delay = self.config.retry.backoff.delay(failures.max(1));
            tracing::info!(
                delay_ms = delay.as_millis() as u64,
                "Retrying connection in {:?}",
                delay
            );
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.set_state(ConnectionState::Disconnected);
        tracing::info!("Connection supervisor stopped");
        Ok(())
    }

    async fn run_session(&mut self, transport: &dyn Transport) -> SessionEnd {
        let Self {
            config,
            outbound,
            inbound,
            pending,
            state,
            hook,
            cancel,
            ..
        } = self;
        let (config, state, hook) = (&*config, &*state, hook.as_ref());

        // Dropping the losing branch cancels that pump at its await point.
        tokio::select! {
            end = send_pump(transport, outbound, pending, config, state) => end,
            end = recv_pump(transport, inbound, hook, config, state) => end,
            _ = cancel.cancelled() => SessionEnd::Stopped,
        }
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            tracing::trace!(from = %previous, to = %next, "Connection state changed");
        }
    }
}

async fn send_pump(
    transport: &dyn Transport,
    outbound: &mut mpsc::UnboundedReceiver<Message>,
    pending: &mut Option<Message>,
    config: &SupervisorConfig,
    state: &watch::Sender<ConnectionState>,
) -> SessionEnd {
    loop {
        let frame = match pending.as_ref() {
            Some(message) => message.encode(),
            None => match outbound.recv().await {
                Some(message) => {
                    let frame = message.encode();
                    *pending = Some(message);
                    frame
                }
                None => return SessionEnd::Abandoned,
            },
        };

        match transport.send(frame, config.write_timeout).await {
            Ok(()) => {
                if let Some(message) = pending.take() {
                    tracing::debug!(sender = %message.sender, "< {}", message.text);
                }
            }
            Err(e) if e.is_probe_trigger() => {
                if let Some(end) = probe(transport, config, state, &e).await {
                    return end;
                }
            }
            Err(e) => return SessionEnd::Failed(e),
        }
    }
}

async fn recv_pump(
    transport: &dyn Transport,
    inbound: &mpsc::UnboundedSender<Message>,
    hook: Option<&InboundHook>,
    config: &SupervisorConfig,
    state: &watch::Sender<ConnectionState>,
) -> SessionEnd {
    loop {
        match transport.recv(config.read_timeout).await {
            Ok(frame) => match Message::decode(&frame) {
                Ok(message) => {
                    tracing::debug!(sender = %message.sender, "> {}", message.text);
                    if let Some(hook) = hook {
                        hook(&message, &Notification::classify(&message));
                    }
                    if inbound.send(message).is_err() {
                        return SessionEnd::Abandoned;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, bytes = frame.len(), "Dropping malformed frame");
                }
            },
            Err(e) if e.is_probe_trigger() => {
                if let Some(end) = probe(transport, config, state, &e).await {
                    return end;
                }
            }
            Err(e) => return SessionEnd::Failed(e),
        }
    }
}

/// Ping the peer; `None` means the session is still alive
async fn probe(
    transport: &dyn Transport,
    config: &SupervisorConfig,
    state: &watch::Sender<ConnectionState>,
    cause: &TransportError,
) -> Option<SessionEnd> {
    state.send_replace(ConnectionState::ProbingKeepalive);

    match transport.ping(config.ping_timeout).await {
        Ok(()) => {
            tracing::trace!(cause = %cause, "Ping OK, keeping connection alive");
            state.send_replace(ConnectionState::Connected);
            None
        }
        Err(e) => {
            tracing::info!(cause = %cause, error = %e, "Keepalive probe failed");
            Some(SessionEnd::Lost)
        }
    }
}
