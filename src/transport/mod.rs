//! Transport
//!
//! Abstraction over one session-based socket connection. The client
//! supervisor only talks to these traits; the WebSocket implementation lives
//! in [`ws`].
//!
//! Every method takes `&self` so the send pump and the receive pump can share
//! one transport: reads and writes travel in disjoint directions.

#[cfg(test)]
pub(crate) mod memory;
mod ws;

pub use ws::{WsConnector, WsTransport};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Opens transports
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a new session to `url`
    async fn connect(&self, url: &str) -> Result<Arc<dyn Transport>, TransportError>;
}

/// One open session
#[async_trait]
pub trait Transport: Send + Sync {
    /// Write one frame, giving up after `timeout`
    async fn send(&self, frame: Vec<u8>, timeout: Duration) -> Result<(), TransportError>;

    /// Read one frame, giving up after `timeout`
    async fn recv(&self, timeout: Duration) -> Result<Vec<u8>, TransportError>;

    /// Send a ping and wait up to `timeout` for the matching pong
    async fn ping(&self, timeout: Duration) -> Result<(), TransportError>;

    /// Close the session; later calls fail with [`TransportError::Closed`]
    async fn close(&self);
}

/// Transport failure classes
#[derive(Debug, Error)]
pub enum TransportError {
    /// Read or write idle past its bound
    #[error("Transport timed out")]
    Timeout,

    /// The peer closed the session
    #[error("Connection closed")]
    Closed,

    /// Name resolution or connect-time failure
    #[error("Network unreachable: {0}")]
    Unreachable(String),

    /// Anything that fits none of the classes above
    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Whether a keepalive probe should decide the session's fate
    pub fn is_probe_trigger(&self) -> bool {
        matches!(self, TransportError::Timeout | TransportError::Closed)
    }

    /// Classify a tungstenite error
    pub fn from_tungstenite(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                TransportError::Closed
            }
            tungstenite::Error::Io(io_err) => Self::from_io(io_err),
            tungstenite::Error::Url(e) => TransportError::Unreachable(e.to_string()),
            tungstenite::Error::Protocol(tungstenite::error::ProtocolError::ResetWithoutClosingHandshake) => {
                TransportError::Closed
            }
            other => TransportError::Other(other.to_string()),
        }
    }

    fn from_io(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        match err.kind() {
            ErrorKind::ConnectionRefused
            | ErrorKind::AddrNotAvailable
            | ErrorKind::NotFound
            | ErrorKind::TimedOut => TransportError::Unreachable(err.to_string()),
            ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof => TransportError::Closed,
            // getaddrinfo failures surface as uncategorized I/O errors
            _ if err.to_string().contains("failed to lookup address") => {
                TransportError::Unreachable(err.to_string())
            }
            _ => TransportError::Other(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_connection_refused_is_unreachable() {
        let err = tungstenite::Error::Io(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
        assert!(matches!(
            TransportError::from_tungstenite(err),
            TransportError::Unreachable(_)
        ));
    }

    #[test]
    fn test_dns_failure_is_unreachable() {
        let err = tungstenite::Error::Io(io::Error::new(
            io::ErrorKind::Other,
            "failed to lookup address information: Name or service not known",
        ));
        assert!(matches!(
            TransportError::from_tungstenite(err),
            TransportError::Unreachable(_)
        ));
    }

    #[test]
    fn test_reset_is_closed() {
        let err = tungstenite::Error::Io(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        assert!(matches!(
            TransportError::from_tungstenite(err),
            TransportError::Closed
        ));
        assert!(matches!(
            TransportError::from_tungstenite(tungstenite::Error::ConnectionClosed),
            TransportError::Closed
        ));
    }

    #[test]
    fn test_other_io_is_unclassified() {
        let err = tungstenite::Error::Io(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        assert!(matches!(
            TransportError::from_tungstenite(err),
            TransportError::Other(_)
        ));
    }

    #[test]
    fn test_probe_triggers() {
        assert!(TransportError::Timeout.is_probe_trigger());
        assert!(TransportError::Closed.is_probe_trigger());
        assert!(!TransportError::Unreachable("x".into()).is_probe_trigger());
        assert!(!TransportError::Other("x".into()).is_probe_trigger());
    }
}
