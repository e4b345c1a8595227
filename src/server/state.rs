//! Application State
//!
//! Shared state accessible by all handlers.

use std::sync::Arc;
use std::time::Instant;

use super::hub::{BroadcastHub, HubConfig};
use crate::config::RelayConfig;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Registry and router for `/ws` connections
    pub hub: Arc<BroadcastHub>,
    /// Settings for `/relay` connections
    pub relay: RelayConfig,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    pub fn new(hub_config: HubConfig, relay: RelayConfig) -> Self {
        Self {
            hub: Arc::new(BroadcastHub::new(hub_config)),
            relay,
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(HubConfig::default(), RelayConfig::default())
    }
}
