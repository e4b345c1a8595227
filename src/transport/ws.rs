//! WebSocket Transport
//!
//! [`Transport`] over `tokio-tungstenite`. The stream is split: a reader task
//! owns the read half and routes data frames into a channel and pong frames
//! into a counter, while writes go through a mutex-guarded sink.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use super::{Connector, Transport, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Opens [`WsTransport`] sessions
#[derive(Debug, Clone, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Arc<dyn Transport>, TransportError> {
        let (stream, response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(TransportError::from_tungstenite)?;

        tracing::debug!(url = %url, status = %response.status(), "WebSocket handshake complete");
        Ok(Arc::new(WsTransport::new(stream)))
    }
}

/// One WebSocket session
pub struct WsTransport {
    sink: Mutex<SplitSink<WsStream, WsMessage>>,
    inbound: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    pongs: watch::Receiver<u64>,
    closed: CancellationToken,
    reader: JoinHandle<()>,
}

impl WsTransport {
    fn new(stream: WsStream) -> Self {
        let (sink, stream) = stream.split();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (pong_tx, pong_rx) = watch::channel(0u64);
        let closed = CancellationToken::new();

        let reader = tokio::spawn(read_frames(stream, inbound_tx, pong_tx, closed.clone()));

        Self {
            sink: Mutex::new(sink),
            inbound: Mutex::new(inbound_rx),
            pongs: pong_rx,
            closed,
            reader,
        }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&self, frame: Vec<u8>, timeout: Duration) -> Result<(), TransportError> {
        if self.closed.is_cancelled() {
            return Err(TransportError::Closed);
        }

        let message = match String::from_utf8(frame) {
            Ok(text) => WsMessage::Text(text),
            Err(e) => WsMessage::Binary(e.into_bytes()),
        };

        let write = async {
            let mut sink = self.sink.lock().await;
            sink.send(message).await
        };

        match tokio::time::timeout(timeout, write).await {
            Ok(result) => result.map_err(TransportError::from_tungstenite),
            Err(_) => Err(TransportError::Timeout),
        }
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
        if self.closed.is_cancelled() {
            return Err(TransportError::Closed);
        }

        let mut pongs = self.pongs.clone();
        pongs.borrow_and_update();

        let probe = async {
            {
                let mut sink = self.sink.lock().await;
                sink.send(WsMessage::Ping(Vec::new()))
                    .await
                    .map_err(TransportError::from_tungstenite)?;
            }
            // The reader task drops the counter's sender when the stream ends.
            pongs.changed().await.map_err(|_| TransportError::Closed)
        };

        match tokio::time::timeout(timeout, probe).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout),
        }
    }

    async fn close(&self) {
        self.closed.cancel();

        let mut sink = self.sink.lock().await;
        if let Err(e) = tokio::time::timeout(CLOSE_GRACE, sink.close()).await {
            tracing::debug!(error = %e, "WebSocket close handshake timed out");
        }
        self.reader.abort();
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_frames(
    mut stream: SplitStream<WsStream>,
    inbound: mpsc::UnboundedSender<Vec<u8>>,
    pongs: watch::Sender<u64>,
    closed: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            _ = closed.cancelled() => break,
            next = stream.next() => next,
        };

        match next {
            Some(Ok(WsMessage::Text(text))) => {
                if inbound.send(text.into_bytes()).is_err() {
                    break;
                }
            }
            Some(Ok(WsMessage::Binary(data))) => {
                if inbound.send(data).is_err() {
                    break;
                }
            }
            Some(Ok(WsMessage::Pong(_))) => {
                pongs.send_modify(|count| *count += 1);
            }
            // Pings are answered by tungstenite on the next flush
            Some(Ok(WsMessage::Ping(_))) | Some(Ok(WsMessage::Frame(_))) => {}
            Some(Ok(WsMessage::Close(frame))) => {
                tracing::debug!(frame = ?frame, "Server closed the WebSocket");
                break;
            }
            Some(Err(e)) => {
                tracing::debug!(error = %e, "WebSocket read failed");
                break;
            }
            None => break,
        }
    }

    closed.cancel();
}
