//! Client Adapters
//!
//! Two ways for an application to talk to a [`Supervisor`]:
//!
//! - [`ChatClient`]: for code running on the same Tokio runtime as the
//!   supervisor; `arecv` suspends until a message arrives.
//! - [`BridgedClient`]: runs the supervisor on a dedicated worker thread with
//!   its own runtime and exposes only non-blocking `send` / `recv`, for
//!   synchronous callers such as a render loop.

use std::thread::JoinHandle;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use super::state::{ConnectionState, ConnectionStatus};
use super::supervisor::Supervisor;
use super::{ClientError, ClientResult};
use crate::message::Message;

/// Native async handle to a supervisor's queues
pub struct ChatClient {
    outbound: mpsc::UnboundedSender<Message>,
    inbound: mpsc::UnboundedReceiver<Message>,
    state: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
}

impl ChatClient {
    pub(super) fn new(
        outbound: mpsc::UnboundedSender<Message>,
        inbound: mpsc::UnboundedReceiver<Message>,
        state: watch::Receiver<ConnectionState>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            outbound,
            inbound,
            state,
            cancel,
        }
    }

    /// Queue a message for sending; never waits on the network
    pub async fn asend(&self, message: Message) -> ClientResult<()> {
        self.enqueue(message)
    }

    /// Wait for the oldest received message
    pub async fn arecv(&mut self) -> ClientResult<Message> {
        self.inbound.recv().await.ok_or(ClientError::SupervisorGone)
    }

    /// Current state machine position
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Online / degraded / offline
    pub fn status(&self) -> ConnectionStatus {
        self.state().status()
    }

    /// Receiver notified on every state change
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Ask the supervisor to shut down
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    fn enqueue(&self, message: Message) -> ClientResult<()> {
        if self.state().status() == ConnectionStatus::Offline {
            tracing::debug!("Offline, buffering outgoing message");
        }
        self.outbound
            .send(message)
            .map_err(|_| ClientError::SupervisorGone)
    }

    fn try_dequeue(&mut self) -> Option<Message> {
        self.inbound.try_recv().ok()
    }
}

/// Non-blocking handle to a supervisor running on its own thread
pub struct BridgedClient {
    client: ChatClient,
    worker: Option<JoinHandle<ClientResult<()>>>,
}

impl BridgedClient {
    /// Start `supervisor` on a dedicated thread and runtime
    pub fn spawn(supervisor: Supervisor, client: ChatClient) -> ClientResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(ClientError::Worker)?;

        let worker = std::thread::Builder::new()
            .name("chatwire-supervisor".to_string())
            .spawn(move || runtime.block_on(supervisor.run()))
            .map_err(ClientError::Worker)?;

        Ok(Self {
            client,
            worker: Some(worker),
        })
    }

    /// Queue a message for sending
    pub fn send(&self, message: Message) -> ClientResult<()> {
        self.client.enqueue(message)
    }

    /// Oldest received message, or `None` when nothing is waiting
    pub fn recv(&mut self) -> Option<Message> {
        self.client.try_dequeue()
    }

    pub fn state(&self) -> ConnectionState {
        self.client.state()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.client.status()
    }

    pub fn stop(&self) {
        self.client.stop();
    }

    /// Stop the supervisor and wait for its thread to finish
    pub fn join(mut self) -> ClientResult<()> {
        self.client.stop();
        match self.worker.take() {
            Some(worker) => worker.join().map_err(|_| ClientError::WorkerPanicked)?,
            None => Ok(()),
        }
    }
}

impl Drop for BridgedClient {
    fn drop(&mut self) {
        self.client.stop();
    }
}
