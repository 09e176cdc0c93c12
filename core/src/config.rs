//! Configuration for chat-broker-core

use crate::{Error, Result};
use std::time::Duration;

/// Configuration for the broker and its helpers
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum messages waiting in the inbound queue (default: 100)
    pub queue_capacity: usize,

    /// Capacity of channels created by `Broker::subscribe` (default: 16)
    pub subscriber_capacity: usize,

    /// How long `Archive::stop` waits for its task (default: 5s)
    pub archive_stop_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
            subscriber_capacity: 16,
            archive_stop_timeout: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Create a config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern: set inbound queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Builder pattern: set default subscriber channel capacity
    pub fn subscriber_capacity(mut self, capacity: usize) -> Self {
        self.subscriber_capacity = capacity;
        self
    }

    /// Builder pattern: set archive stop timeout
    pub fn archive_stop_timeout(mut self, timeout: Duration) -> Self {
        self.archive_stop_timeout = timeout;
        self
    }

    /// Reject capacities tokio channels cannot be built with
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(Error::Config("queue_capacity must be greater than 0".into()));
        }
        if self.subscriber_capacity == 0 {
            return Err(Error::Config(
                "subscriber_capacity must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
