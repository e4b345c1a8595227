//! In-process transport for exercising the supervisor without sockets.
//!
//! Each successful connect hands the test a [`Peer`] holding the far end of
//! the session. Dropping the peer closes the session.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

use super::{Connector, Transport, TransportError};

/// Far end of one memory session
pub(crate) struct Peer {
    pub url: String,
    pub to_client: mpsc::UnboundedSender<Vec<u8>>,
    pub from_client: mpsc::UnboundedReceiver<Vec<u8>>,
    /// Whether pings are answered
    pub answer_pings: Arc<AtomicBool>,
    /// Whether client writes hang until their timeout
    pub writes_stalled: Arc<AtomicBool>,
}

impl Peer {
    pub fn stop_answering_pings(&self) {
        self.answer_pings.store(false, Ordering::SeqCst);
    }

    /// Make every client write hang until its timeout and fail
    pub fn stall_writes(&self) {
        self.writes_stalled.store(true, Ordering::SeqCst);
    }

    pub fn resume_writes(&self) {
        self.writes_stalled.store(false, Ordering::SeqCst);
    }

    pub async fn next_frame(&mut self, within: Duration) -> Option<Vec<u8>> {
        tokio::time::timeout(within, self.from_client.recv())
            .await
            .ok()
            .flatten()
    }
}

pub(crate) struct MemoryConnector {
    failures: StdMutex<VecDeque<TransportError>>,
    peers: mpsc::UnboundedSender<Peer>,
    pub attempts: AtomicUsize,
}

impl MemoryConnector {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Peer>) {
        let (peers, peer_rx) = mpsc::unbounded_channel();
        let connector = Self {
            failures: StdMutex::new(VecDeque::new()),
            peers,
            attempts: AtomicUsize::new(0),
        };
        (Arc::new(connector), peer_rx)
    }

    /// Make the next connect attempts fail, in order
    pub fn fail_next(&self, errors: impl IntoIterator<Item = TransportError>) {
        self.failures.lock().unwrap().extend(errors);
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, url: &str) -> Result<Arc<dyn Transport>, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }

        let (to_client, client_inbound) = mpsc::unbounded_channel();
        let (client_outbound, from_client) = mpsc::unbounded_channel();
        let answer_pings = Arc::new(AtomicBool::new(true));
        let writes_stalled = Arc::new(AtomicBool::new(false));

        let peer = Peer {
            url: url.to_string(),
            to_client,
            from_client,
            answer_pings: Arc::clone(&answer_pings),
            writes_stalled: Arc::clone(&writes_stalled),
        };
        if self.peers.send(peer).is_err() {
            return Err(TransportError::Unreachable("test harness gone".to_string()));
        }

        Ok(Arc::new(MemoryTransport {
            outbound: client_outbound,
            inbound: Mutex::new(client_inbound),
            answer_pings,
            writes_stalled,
        }))
    }
}

struct MemoryTransport {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    inbound: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    answer_pings: Arc<AtomicBool>,
    writes_stalled: Arc<AtomicBool>,
}

/// Round trip of an answered ping
const PONG_DELAY: Duration = Duration::from_millis(20);

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, frame: Vec<u8>, timeout: Duration) -> Result<(), TransportError> {
        if self.writes_stalled.load(Ordering::SeqCst) {
            tokio::time::sleep(timeout).await;
            return Err(TransportError::Timeout);
        }
        self.outbound.send(frame).map_err(|_| TransportError::Closed)
    }

    async fn recv(&self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let mut inbound = self.inbound.lock().await;
        match tokio::time::timeout(timeout, inbound.recv()).await {
            Ok(Some(frame)) => Ok(frame),
            Ok(None) => Err(TransportError::Closed),
            Err(_) => Err(TransportError::Timeout),
        }
    }

    async fn ping(&self, timeout: Duration) -> Result<(), TransportError> {
        if self.outbound.is_closed() {
            return Err(TransportError::Closed);
        }
        if self.answer_pings.load(Ordering::SeqCst) && PONG_DELAY < timeout {
            tokio::time::sleep(PONG_DELAY).await;
            return Ok(());
        }
        tokio::time::sleep(timeout).await;
        Err(TransportError::Timeout)
    }

    async fn close(&self) {}
}
