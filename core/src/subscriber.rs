//! Subscriber registry
//!
//! Maps subscriber identities to the outbound channels their owners read
//! from. The broker only ever writes to these channels, and only with
//! `try_send`; it never closes or reads them.

use crate::Message;
use std::collections::HashMap;
use tokio::sync::{RwLock, mpsc};
use tracing::debug;

/// Outbound delivery channel owned by a subscriber
pub type Outbound = mpsc::Sender<Message>;

/// Concurrent map from subscriber id to delivery channel
#[derive(Default)]
pub(crate) struct Registry {
    subscribers: RwLock<HashMap<String, Outbound>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the channel for `id` (last writer wins)
    pub(crate) async fn register(&self, id: String, outbound: Outbound) {
        let mut subscribers = self.subscribers.write().await;
        if subscribers.insert(id.clone(), outbound).is_some() {
            debug!("Replaced channel for subscriber {}", id);
        } else {
            debug!("Registered subscriber {}", id);
        }
    }

    /// Remove `id`; unknown ids are ignored
    pub(crate) async fn unregister(&self, id: &str) {
        let mut subscribers = self.subscribers.write().await;
        if subscribers.remove(id).is_some() {
            debug!("Unregistered subscriber {}", id);
        }
    }

    /// Clone the channel for `id`, releasing the lock before returning
    pub(crate) async fn get(&self, id: &str) -> Option<Outbound> {
        let subscribers = self.subscribers.read().await;
        subscribers.get(id).cloned()
    }

    /// Clone every registered channel, releasing the lock before returning
    pub(crate) async fn snapshot(&self) -> Vec<(String, Outbound)> {
        let subscribers = self.subscribers.read().await;
        subscribers
            .iter()
            .map(|(id, tx)| (id.clone(), tx.clone()))
            .collect()
    }

    pub(crate) async fn contains(&self, id: &str) -> bool {
        let subscribers = self.subscribers.read().await;
        subscribers.contains_key(id)
    }

    pub(crate) async fn len(&self) -> usize {
        let subscribers = self.subscribers.read().await;
        subscribers.len()
    }
}
