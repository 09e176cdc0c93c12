//! Message store abstraction
//!
//! An append-only log of sent messages. Reads hand back owned copies so a
//! caller never observes later appends mid-iteration.

use crate::message::{Message, StoredMessage};
use crate::{Error, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Message store trait
#[async_trait]
pub trait MessageStore: Send + Sync + 'static {
    /// Append a message, returning the record with its assigned id
    async fn append(&self, message: &Message) -> Result<StoredMessage>;

    /// Snapshot of stored messages in append order, optionally filtered by
    /// sender (an empty filter matches everything)
    async fn query(&self, sender: Option<&str>) -> Result<Vec<StoredMessage>>;

    /// Fetch a single message by id
    async fn get(&self, id: i64) -> Result<StoredMessage>;

    /// Number of stored messages
    async fn count(&self) -> Result<usize>;
}

/// In-memory [`MessageStore`]
pub struct MemoryStore {
    messages: RwLock<Vec<StoredMessage>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            messages: RwLock::new(Vec::with_capacity(capacity)),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn append(&self, message: &Message) -> Result<StoredMessage> {
        let mut messages = self.messages.write().await;
        let mut stored = StoredMessage::from(message);
        // Ids follow position; the log is append-only.
        stored.id = messages.len() as i64 + 1;
        messages.push(stored.clone());
        Ok(stored)
    }

    async fn query(&self, sender: Option<&str>) -> Result<Vec<StoredMessage>> {
        let messages = self.messages.read().await;
        let filtered = match sender {
            Some(sender) if !sender.is_empty() => messages
                .iter()
                .filter(|m| m.sender == sender)
                .cloned()
                .collect(),
            _ => messages.clone(),
        };
        Ok(filtered)
    }

    async fn get(&self, id: i64) -> Result<StoredMessage> {
        let messages = self.messages.read().await;
        usize::try_from(id)
            .ok()
            .and_then(|id| id.checked_sub(1))
            .and_then(|index| messages.get(index))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("message {}", id)))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.messages.read().await.len())
    }
}
