//! Message Envelope
//!
//! The single JSON object exchanged between chat clients and the server.

use chrono::{Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sender name used when a message does not carry one
pub const SYSTEM_SENDER: &str = "System";

/// Wire envelope for every chat message
///
/// Optional fields always serialize (as `null` when absent) so that a decoded
/// message is indistinguishable from the one that was encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Display name of the sender
    #[serde(default = "default_sender")]
    pub sender: String,
    /// Chat text, possibly empty
    #[serde(default)]
    pub text: String,
    /// Named directive for the receiving application; empty for plain chat
    #[serde(default)]
    pub action: String,
    /// Unix timestamp in seconds
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub sender_id: Option<String>,
    #[serde(default)]
    pub message_id: Option<i64>,
    #[serde(default, alias = "reciepents")]
    pub recipients: Option<Vec<String>>,
    #[serde(default, alias = "reciepent_ids")]
    pub recipient_ids: Option<Vec<String>>,
}

fn default_sender() -> String {
    SYSTEM_SENDER.to_string()
}

impl Default for Message {
    fn default() -> Self {
        Self {
            sender: default_sender(),
            text: String::new(),
            action: String::new(),
            created_at: 0,
            sender_id: None,
            message_id: None,
            recipients: None,
            recipient_ids: None,
        }
    }
}

impl Message {
    /// Create a chat message stamped with the current time
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
            created_at: now_timestamp(),
            ..Default::default()
        }
    }

    /// Create a message from the default system sender, stamped now
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(SYSTEM_SENDER, text)
    }

    /// Attach a named directive
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }

    /// Set the creation timestamp explicitly
    pub fn at(mut self, created_at: i64) -> Self {
        self.created_at = created_at;
        self
    }

    /// Whether this message carries a directive rather than plain chat
    pub fn is_directive(&self) -> bool {
        !self.action.is_empty()
    }

    /// Serialize to the JSON wire format
    pub fn encode(&self) -> Vec<u8> {
        self.to_json().into_bytes()
    }

    /// Serialize to the JSON wire format as a text frame payload
    pub fn to_json(&self) -> String {
        // Only strings, integers and string lists: serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Parse a message from the JSON wire format
    ///
    /// Unknown fields are ignored and missing fields take their defaults.
    /// Anything that is not a JSON object is rejected, including arrays that
    /// serde would otherwise accept as a positional struct.
    pub fn decode(bytes: &[u8]) -> Result<Self, ParseError> {
        let value: serde_json::Value = serde_json::from_slice(bytes)?;
        if !value.is_object() {
            return Err(ParseError::NotAnObject);
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Local-time rendering of `created_at` as `YYYY-MM-DD HH:MM:SS`
    pub fn formatted_time(&self) -> String {
        match Local.timestamp_opt(self.created_at, 0).earliest() {
            Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => self.created_at.to_string(),
        }
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_directive() {
            write!(f, "[{}] {} <{}>: {}", self.formatted_time(), self.sender, self.action, self.text)
        } else {
            write!(f, "[{}] {}: {}", self.formatted_time(), self.sender, self.text)
        }
    }
}

/// Current Unix time in seconds
pub fn now_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// Errors produced when decoding a wire payload
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Malformed message payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Message payload is not a JSON object")]
    NotAnObject,
}
