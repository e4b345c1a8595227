//! Supervisor Settings
//!
//! Timeouts and the reconnect policy, in runtime form. The TOML-facing
//! counterpart lives in [`crate::config::ClientConfig`].

use std::time::Duration;

/// Runtime settings for one [`Supervisor`](super::Supervisor)
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Full endpoint URL, e.g. `ws://localhost:5555/ws/bob?token=...`
    pub url: String,
    /// Idle read bound before a keepalive probe
    pub read_timeout: Duration,
    /// Write bound before a keepalive probe
    pub write_timeout: Duration,
    /// How long a probe waits for its pong
    pub ping_timeout: Duration,
    /// Bound on a single connect attempt
    pub connect_timeout: Duration,
    pub retry: RetryPolicy,
}

impl SupervisorConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            read_timeout: Duration::from_secs(1),
            write_timeout: Duration::from_secs(1),
            ping_timeout: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }
}

/// What to do after a connection attempt fails or a session is lost
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Give up after this many consecutive failed connect attempts; `None`
    /// retries forever. `Some(0)` behaves like `Some(1)`: a lost session is
    /// always reconnected, a failed connect is never retried.
    pub max_attempts: Option<u32>,
    pub backoff: Backoff,
    /// Treat unclassified transport errors like a lost connection instead of
    /// stopping the supervisor
    pub retry_unclassified: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: None,
            backoff: Backoff::Constant(Duration::from_secs(5)),
            retry_unclassified: true,
        }
    }
}

impl RetryPolicy {
    /// Whether `failures` consecutive failures exhaust the policy
    ///
    /// Zero failures (a session that was lost after connecting) never does.
    pub fn is_exhausted(&self, failures: u32) -> bool {
        failures > 0 && self.max_attempts.is_some_and(|max| failures >= max)
    }
}

/// Sleep shape between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Constant(Duration),
    /// Doubles from `initial` per consecutive failure, capped at `max`
    Exponential { initial: Duration, max: Duration },
}

impl Backoff {
    /// Delay before retry number `attempt` (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Constant(delay) => delay,
            Backoff::Exponential { initial, max } => {
                let shift = attempt.saturating_sub(1).min(16);
                initial.saturating_mul(1u32 << shift).min(max)
            }
        }
    }
}
