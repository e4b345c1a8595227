//! Connection state published by the supervisor.

use std::fmt;

/// Supervisor state machine position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// A read or write stalled and a ping is outstanding
    ProbingKeepalive,
}

/// Coarse status for display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Online,
    Degraded,
    /// Outgoing messages are being buffered
    Offline,
}

impl ConnectionState {
    pub fn status(&self) -> ConnectionStatus {
        match self {
            ConnectionState::Connected => ConnectionStatus::Online,
            ConnectionState::ProbingKeepalive => ConnectionStatus::Degraded,
            ConnectionState::Connecting | ConnectionState::Disconnected => {
                ConnectionStatus::Offline
            }
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::ProbingKeepalive => "probing keepalive",
        };
        f.write_str(name)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionStatus::Online => "online",
            ConnectionStatus::Degraded => "degraded",
            ConnectionStatus::Offline => "offline",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_projection() {
        assert_eq!(ConnectionState::Connected.status(), ConnectionStatus::Online);
        assert_eq!(
            ConnectionState::ProbingKeepalive.status(),
            ConnectionStatus::Degraded
        );
        assert_eq!(ConnectionState::Connecting.status(), ConnectionStatus::Offline);
        assert_eq!(ConnectionState::Disconnected.status(), ConnectionStatus::Offline);
    }
}
