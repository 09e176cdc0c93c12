//! Archive subscriber
//!
//! Persists what a broker delivers to it into a [`MessageStore`]. The archive
//! is an ordinary subscriber: it sees every broadcast plus direct messages
//! addressed to its id, and it loses messages like any other subscriber when
//! its channel is full.

use crate::store::MessageStore;
use crate::{Broker, Message};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// A running archive task bound to a broker
pub struct Archive {
    id: String,
    broker: Arc<Broker>,
    handle: JoinHandle<()>,
    stop: CancellationToken,
    stop_timeout: Duration,
}

impl Archive {
    /// Register `id` on the broker and start appending its deliveries to
    /// `store`
    ///
    /// Channel capacity and stop timeout come from the broker's config.
    pub async fn start(
        broker: Arc<Broker>,
        id: impl Into<String>,
        store: Arc<dyn MessageStore>,
    ) -> Self {
        let id = id.into();
        let rx = broker.subscribe(id.clone()).await;
        // Fires on our own stop or on broker cancellation.
        let stop = broker.cancellation_token().child_token();

        let task_id = id.clone();
        let task_stop = stop.clone();
        let handle = tokio::spawn(async move {
            archive_loop(task_id, rx, store, task_stop).await;
        });

        info!("Archive started for subscriber {}", id);

        let stop_timeout = broker.config().archive_stop_timeout;
        Self {
            id,
            broker,
            handle,
            stop,
            stop_timeout,
        }
    }

    /// Unregister, drain what is already queued, and stop the task
    pub async fn stop(self) {
        info!("Stopping archive for subscriber {}", self.id);
        self.broker.unregister(&self.id).await;
        self.stop.cancel();

        let mut handle = self.handle;
        tokio::select! {
            _ = &mut handle => {
                debug!("Archive task completed");
            }
            _ = tokio::time::sleep(self.stop_timeout) => {
                warn!("Archive task did not complete in time, aborting");
                handle.abort();
            }
        }
    }

    /// Get the subscriber id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// How long `stop` waits before aborting the task
    pub fn stop_timeout(&self) -> Duration {
        self.stop_timeout
    }

    /// Check if the archive task has exited
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

async fn archive_loop(
    id: String,
    mut rx: mpsc::Receiver<Message>,
    store: Arc<dyn MessageStore>,
    stop: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            next = rx.recv() => match next {
                Some(message) => append(&id, store.as_ref(), &message).await,
                None => break,
            },
        }
    }

    rx.close();
    while let Ok(message) = rx.try_recv() {
        append(&id, store.as_ref(), &message).await;
    }

    debug!("Archive loop for subscriber {} stopped", id);
}

async fn append(id: &str, store: &dyn MessageStore, message: &Message) {
    if let Err(e) = store.append(message).await {
        error!(
            "Archive {} failed to store message from {}: {}",
            id, message.sender, e
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::StoredMessage;
    use crate::store::MemoryStore;
    use crate::{Config, Error};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    const WAIT: Duration = Duration::from_secs(2);

    fn running_broker() -> Arc<Broker> {
        let broker = Arc::new(Broker::new(None));
        let runner = broker.clone();
        tokio::spawn(async move { runner.run().await });
        broker
    }

    async fn settle(broker: &Broker, observer: &mut mpsc::Receiver<Message>) {
        broker
            .send(Message::direct("settle", "observer", "sentinel"))
            .await
            .unwrap();
        tokio::time::timeout(WAIT, async {
            while let Some(message) = observer.recv().await {
                if message.sender == "settle" {
                    return;
                }
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_archive_stores_broadcasts_and_own_directs() {
        let broker = running_broker();
        let mut observer = broker.subscribe("observer").await;
        let store = Arc::new(MemoryStore::new());
        let archive = Archive::start(broker.clone(), "archive", store.clone()).await;
        assert!(broker.is_registered("archive").await);

        broker.send(Message::broadcast("alice", "hello")).await.unwrap();
        broker
            .send(Message::direct("bob", "archive", "for the record"))
            .await
            .unwrap();
        broker
            .send(Message::direct("bob", "carol", "private"))
            .await
            .unwrap();
        settle(&broker, &mut observer).await;

        archive.stop().await;
        assert!(!broker.is_registered("archive").await);

        let contents: Vec<_> = store
            .query(None)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["hello", "for the record"]);

        broker.shutdown();
    }

    #[tokio::test]
    async fn test_archive_exits_on_broker_shutdown() {
        let broker = running_broker();
        let store = Arc::new(MemoryStore::new());
        let archive = Archive::start(broker.clone(), "archive", store).await;

        broker.shutdown();
        tokio::time::timeout(WAIT, async {
            while !archive.is_finished() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_stop_timeout_follows_broker_config() {
        let config = Config::new().archive_stop_timeout(Duration::from_millis(50));
        let broker = Arc::new(Broker::with_config(config, None).unwrap());

        let archive = Archive::start(broker.clone(), "archive", Arc::new(MemoryStore::new())).await;
        assert_eq!(archive.stop_timeout(), Duration::from_millis(50));
        assert!(broker.is_registered("archive").await);

        archive.stop().await;
        assert!(!broker.is_registered("archive").await);
    }

    /// Fails the first append with a backend error, records the rest
    #[derive(Default)]
    struct FlakyStore {
        failed_once: AtomicBool,
        inner: MemoryStore,
    }

    #[async_trait]
    impl MessageStore for FlakyStore {
        async fn append(&self, message: &Message) -> crate::Result<StoredMessage> {
            if !self.failed_once.swap(true, Ordering::SeqCst) {
                return Err(Error::Store("connection reset".into()));
            }
            self.inner.append(message).await
        }

        async fn query(&self, sender: Option<&str>) -> crate::Result<Vec<StoredMessage>> {
            self.inner.query(sender).await
        }

        async fn get(&self, id: i64) -> crate::Result<StoredMessage> {
            self.inner.get(id).await
        }

        async fn count(&self) -> crate::Result<usize> {
            self.inner.count().await
        }
    }

    #[tokio::test]
    async fn test_flaky_store_reports_store_error() {
        let store = FlakyStore::default();
        let first = store.append(&Message::broadcast("alice", "one")).await;
        assert!(matches!(first, Err(Error::Store(_))));
        assert!(store.append(&Message::broadcast("alice", "two")).await.is_ok());
    }

    #[tokio::test]
    async fn test_store_errors_do_not_stop_archive() {
        let broker = running_broker();
        let mut observer = broker.subscribe("observer").await;
        let store = Arc::new(FlakyStore::default());
        let archive = Archive::start(broker.clone(), "archive", store.clone()).await;

        broker.send(Message::broadcast("alice", "one")).await.unwrap();
        broker.send(Message::broadcast("alice", "two")).await.unwrap();
        settle(&broker, &mut observer).await;

        assert_eq!(archive.id(), "archive");
        archive.stop().await;

        let contents: Vec<_> = store
            .query(None)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["two"]);
        broker.shutdown();
    }
}
