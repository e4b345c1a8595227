//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::client::{Backoff, RetryPolicy, SupervisorConfig};
use crate::server::HubConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub relay: RelayConfig,

    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Chat server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    #[serde(default = "default_bot_name")]
    pub bot_name: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5555
}

fn default_max_connections() -> usize {
    1000
}

fn default_bot_name() -> String {
    "Bot".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_connections: default_max_connections(),
            bot_name: default_bot_name(),
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            max_connections: self.max_connections,
            bot_name: self.bot_name.clone(),
        }
    }
}

/// Echo relay configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Send every reply a second time after a random delay
    #[serde(default)]
    pub duplicate_replies: bool,

    /// Upper bound of that delay
    #[serde(default = "default_max_jitter")]
    pub max_jitter_ms: u64,
}

fn default_max_jitter() -> u64 {
    3000
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            duplicate_replies: false,
            max_jitter_ms: default_max_jitter(),
        }
    }
}

/// Chat client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Server base URL, without the `/ws/...` path
    #[serde(default = "default_url")]
    pub url: String,

    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default = "default_token")]
    pub token: String,

    #[serde(default = "default_io_timeout")]
    pub read_timeout_ms: u64,

    #[serde(default = "default_io_timeout")]
    pub write_timeout_ms: u64,

    #[serde(default = "default_io_timeout")]
    pub ping_timeout_ms: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Pause between reconnection attempts
    #[serde(default = "default_sleep_time")]
    pub sleep_time_ms: u64,

    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_url() -> String {
    "ws://localhost:5555".to_string()
}

fn default_user() -> String {
    "bob".to_string()
}

fn default_token() -> String {
    "test_token".to_string()
}

fn default_io_timeout() -> u64 {
    1000
}

fn default_connect_timeout() -> u64 {
    10_000
}

fn default_sleep_time() -> u64 {
    5000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            user: default_user(),
            token: default_token(),
            read_timeout_ms: default_io_timeout(),
            write_timeout_ms: default_io_timeout(),
            ping_timeout_ms: default_io_timeout(),
            connect_timeout_ms: default_connect_timeout(),
            sleep_time_ms: default_sleep_time(),
            retry: RetryConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Full chat URL for the configured user and token
    pub fn endpoint_url(&self) -> String {
        format!(
            "{}/ws/{}?token={}",
            self.url.trim_end_matches('/'),
            urlencoding::encode(&self.user),
            urlencoding::encode(&self.token)
        )
    }

    /// Runtime settings for the connection supervisor
    pub fn supervisor_config(&self) -> SupervisorConfig {
        let sleep_time = Duration::from_millis(self.sleep_time_ms);
        let backoff = match self.retry.backoff {
            BackoffKind::Constant => Backoff::Constant(sleep_time),
            BackoffKind::Exponential => Backoff::Exponential {
                initial: sleep_time,
                max: Duration::from_millis(self.retry.max_delay_ms),
            },
        };

        SupervisorConfig {
            url: self.endpoint_url(),
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            ping_timeout: Duration::from_millis(self.ping_timeout_ms),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            retry: RetryPolicy {
                max_attempts: self.retry.max_attempts,
                backoff,
                retry_unclassified: self.retry.retry_unclassified,
            },
        }
    }
}

/// Reconnection policy configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Consecutive failed connects before giving up; unset retries forever
    #[serde(default)]
    pub max_attempts: Option<u32>,

    #[serde(default)]
    pub backoff: BackoffKind,

    /// Cap for exponential backoff
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    #[serde(default = "default_retry_unclassified")]
    pub retry_unclassified: bool,
}

fn default_max_delay() -> u64 {
    60_000
}

fn default_retry_unclassified() -> bool {
    true
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: None,
            backoff: BackoffKind::default(),
            max_delay_ms: default_max_delay(),
            retry_unclassified: default_retry_unclassified(),
        }
    }
}

/// Shape of the delay between reconnection attempts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    #[default]
    Constant,
    Exponential,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("chatwire").join("config.toml")),
            Some(PathBuf::from("/etc/chatwire/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // Server overrides
        if let Some(host) = lookup("CHATWIRE_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("CHATWIRE_PORT") {
            match port.parse() {
                Ok(p) => self.server.port = p,
                Err(_) => tracing::warn!("Ignoring invalid CHATWIRE_PORT {:?}", port),
            }
        }

        // Client overrides
        if let Some(url) = lookup("CHATWIRE_URL") {
            self.client.url = url;
        }
        if let Some(user) = lookup("CHATWIRE_USER") {
            self.client.user = user;
        }
        if let Some(token) = lookup("CHATWIRE_TOKEN") {
            self.client.token = token;
        }

        // Logging overrides
        if let Some(level) = lookup("CHATWIRE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("CHATWIRE_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Chatwire Configuration
#
# Environment variables override these settings:
# - CHATWIRE_HOST
# - CHATWIRE_PORT
# - CHATWIRE_URL
# - CHATWIRE_USER
# - CHATWIRE_TOKEN
# - CHATWIRE_LOG_LEVEL
# - CHATWIRE_LOG_FORMAT

[server]
# Address to listen on
host = "0.0.0.0"
port = 5555

# Further connections are refused once this many are open
max_connections = 1000

# Sender name on private replies
bot_name = "Bot"

[relay]
# Send every relay reply twice, the copy after a random delay
duplicate_replies = false

# Upper bound of that delay (ms)
max_jitter_ms = 3000

[client]
# Server base URL; the client connects to {url}/ws/{user}?token={token}
url = "ws://localhost:5555"
user = "bob"
token = "test_token"

# Idle time before a keepalive probe (ms)
read_timeout_ms = 1000

# Time allowed for one outgoing frame (ms)
write_timeout_ms = 1000

# Time to wait for a pong (ms)
ping_timeout_ms = 1000

# Time allowed for the WebSocket handshake (ms)
connect_timeout_ms = 10000

# Pause between reconnection attempts (ms)
sleep_time_ms = 5000

[client.retry]
# Give up after this many consecutive failed connects (omit to retry forever)
# max_attempts = 10

# Backoff shape: constant or exponential
backoff = "constant"

# Cap for exponential backoff (ms)
max_delay_ms = 60000

# Treat unexpected errors like a lost connection instead of stopping
retry_unclassified = true

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
