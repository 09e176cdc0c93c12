//! Message broker
//!
//! This is the main interface for chat-broker-core, providing:
//! - A bounded inbound queue that back-pressures producers
//! - A single dispatch loop routing direct and broadcast messages
//! - Non-blocking, best-effort delivery to subscriber channels
//! - Graceful shutdown through a shared cancellation token

use crate::subscriber::{Outbound, Registry};
use crate::{Config, Error, Message, Result};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

/// Routes chat messages between registered subscribers
pub struct Broker {
    config: Config,
    tx: mpsc::Sender<Message>,
    /// Taken by the first call to `run`
    inbox: Mutex<Option<mpsc::Receiver<Message>>>,
    registry: Registry,
    shutdown: CancellationToken,
    done: CancellationToken,
}

impl Broker {
    /// Create a broker with the default configuration
    ///
    /// Without a token the broker only stops through [`Broker::shutdown`].
    pub fn new(shutdown: Option<CancellationToken>) -> Self {
        Self::build(Config::default(), shutdown)
    }

    /// Create a broker with a custom configuration
    pub fn with_config(config: Config, shutdown: Option<CancellationToken>) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, shutdown))
    }

    fn build(config: Config, shutdown: Option<CancellationToken>) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity);

        Self {
            config,
            tx,
            inbox: Mutex::new(Some(rx)),
            registry: Registry::new(),
            shutdown: shutdown.unwrap_or_else(CancellationToken::new),
            done: CancellationToken::new(),
        }
    }

    /// Run the dispatch loop until the broker is cancelled
    ///
    /// Must be driven on its own task. Only the first call owns the inbound
    /// queue; later calls return [`Error::AlreadyRunning`].
    pub async fn run(&self) -> Result<()> {
        let mut inbox = self.inbox.lock().await.take().ok_or(Error::AlreadyRunning)?;

        info!(
            "Broker dispatch loop started with queue_capacity={}",
            self.config.queue_capacity
        );

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    debug!("Cancellation observed, exiting dispatch loop");
                    break;
                }
                next = inbox.recv() => match next {
                    Some(message) => self.dispatch(message).await,
                    None => break,
                },
            }
        }

        inbox.close();
        drop(inbox);
        self.done.cancel();

        info!("Broker dispatch loop stopped");
        Ok(())
    }

    /// Enqueue a message for dispatch
    ///
    /// Waits for queue space; fails with [`Error::Cancelled`] once the broker
    /// is cancelled, including while waiting.
    pub async fn send(&self, message: Message) -> Result<()> {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(Error::Cancelled),
            sent = self.tx.send(message) => sent.map_err(|_| Error::Cancelled),
        }
    }

    /// Register a delivery channel, replacing any previous one for `id`
    pub async fn register(&self, id: impl Into<String>, outbound: Outbound) {
        self.registry.register(id.into(), outbound).await;
    }

    /// Remove a subscriber; unknown ids are a no-op
    pub async fn unregister(&self, id: &str) {
        self.registry.unregister(id).await;
    }

    /// Create a channel of `subscriber_capacity`, register it and return the
    /// receiving half
    pub async fn subscribe(&self, id: impl Into<String>) -> mpsc::Receiver<Message> {
        let (tx, rx) = mpsc::channel(self.config.subscriber_capacity);
        self.register(id, tx).await;
        rx
    }

    /// Get the broker configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Check if a subscriber is registered
    pub async fn is_registered(&self, id: &str) -> bool {
        self.registry.contains(id).await
    }

    /// Get the number of registered subscribers
    pub async fn subscriber_count(&self) -> usize {
        self.registry.len().await
    }

    /// Cancel the broker
    pub fn shutdown(&self) {
        info!("Broker shutting down...");
        self.shutdown.cancel();
    }

    /// Token shared by the broker and anything that should stop with it
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Check if the dispatch loop has exited
    pub fn is_stopped(&self) -> bool {
        self.done.is_cancelled()
    }

    /// Wait for the dispatch loop to exit
    pub async fn stopped(&self) {
        self.done.cancelled().await;
    }

    async fn dispatch(&self, message: Message) {
        if message.broadcast {
            // Sender is included on purpose.
            for (id, outbound) in self.registry.snapshot().await {
                deliver(&id, &outbound, message.clone());
            }
            return;
        }

        if message.is_self_addressed() {
            debug!("Dropping self-addressed message from {}", message.sender);
            return;
        }

        match self.registry.get(&message.recipient).await {
            Some(outbound) => {
                let recipient = message.recipient.clone();
                deliver(&recipient, &outbound, message);
            }
            None => {
                debug!(
                    "Dropping message from {} for unknown recipient {}",
                    message.sender, message.recipient
                );
            }
        }
    }
}

/// Attempt a single non-blocking write
fn deliver(id: &str, outbound: &Outbound, message: Message) {
    match outbound.try_send(message) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            trace!("Channel for subscriber {} is full, message dropped", id);
        }
        Err(TrySendError::Closed(_)) => {
            trace!("Channel for subscriber {} is closed, message dropped", id);
        }
    }
}
