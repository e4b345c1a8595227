//! Echo Relay
//!
//! Single-socket variant of the hub: no registry and no broadcast. Inbound
//! messages are queued and a separate consumer answers each with the bot
//! reply. Optionally every reply is sent a second time after a random delay,
//! which is useful for exercising client-side ordering.

use rand::Rng;
use std::time::Duration;
use tokio::sync::mpsc;

use super::hub::reply_envelope;
use crate::config::RelayConfig;
use crate::message::Message;

/// Consumer side of one relay connection
pub struct EchoRelay {
    config: RelayConfig,
    bot_name: String,
}

impl EchoRelay {
    pub fn new(config: RelayConfig, bot_name: impl Into<String>) -> Self {
        Self {
            config,
            bot_name: bot_name.into(),
        }
    }

    /// Drain `queue` until it closes, answering on `out`
    pub async fn run(
        self,
        mut queue: mpsc::UnboundedReceiver<Message>,
        out: mpsc::UnboundedSender<Message>,
    ) {
        while let Some(message) = queue.recv().await {
            let reply = reply_envelope(&self.bot_name, message);

            if self.config.duplicate_replies {
                let delay = self.jitter();
                let duplicate = reply.clone();
                let out = out.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = out.send(duplicate);
                });
            }

            if out.send(reply).is_err() {
                break;
            }
        }
        tracing::debug!("Relay queue closed");
    }

    fn jitter(&self) -> Duration {
        if self.config.max_jitter_ms == 0 {
            return Duration::ZERO;
        }
        let millis = rand::rng().random_range(0..=self.config.max_jitter_ms);
        Duration::from_millis(millis)
    }
}
