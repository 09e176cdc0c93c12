//! Message types for chat-broker-core

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A chat message routed by the broker
///
/// When `broadcast` is set the `recipient` field is ignored by dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Identity of the producer
    pub sender: String,

    /// Subscriber key for direct delivery (empty for broadcasts)
    #[serde(default)]
    pub recipient: String,

    /// Message body
    pub content: String,

    /// Deliver to every registered subscriber
    #[serde(default)]
    pub broadcast: bool,

    /// Unix time in seconds
    pub timestamp: i64,
}

impl Message {
    /// Create a message for a single recipient
    pub fn direct(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            content: content.into(),
            broadcast: false,
            timestamp: Utc::now().timestamp(),
        }
    }

    /// Create a message for every registered subscriber
    pub fn broadcast(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            recipient: String::new(),
            content: content.into(),
            broadcast: true,
            timestamp: Utc::now().timestamp(),
        }
    }

    /// Create a direct message whose content is a JSON payload
    pub fn with_json<T: Serialize>(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        let json = serde_json::to_string(payload)?;
        Ok(Self::direct(sender, recipient, json))
    }

    /// Override the timestamp
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Direct message whose recipient is its own sender
    pub fn is_self_addressed(&self) -> bool {
        !self.broadcast && self.sender == self.recipient
    }
}

/// A message as recorded by a [`MessageStore`](crate::store::MessageStore)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Store-assigned id (0 until appended)
    #[serde(default)]
    pub id: i64,

    pub sender: String,

    pub content: String,

    pub timestamp: i64,
}

impl From<&Message> for StoredMessage {
    fn from(message: &Message) -> Self {
        Self {
            id: 0,
            sender: message.sender.clone(),
            content: message.content.clone(),
            timestamp: message.timestamp,
        }
    }
}
