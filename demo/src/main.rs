//! Scripted chat session driving chat-broker-core
//!
//! Stands in for the connection adapters that would normally own subscriber
//! channels. Set `RUST_LOG=debug` to watch routing decisions.

use chat_broker_core::{
    Archive, Broker, CancellationToken, Config, MemoryStore, Message, MessageStore, Result, User,
    UserManager,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Subscribe `id` and print everything delivered to it
async fn spawn_reader(broker: &Broker, id: &str) {
    let mut rx: mpsc::Receiver<Message> = broker.subscribe(id).await;
    let id = id.to_string();
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let kind = if message.broadcast { "broadcast" } else { "direct" };
            info!("[{}] {} from {}: {}", id, kind, message.sender, message.content);
        }
    });
}

/// Log how the dispatch task ended; returns true on a clean exit
fn report_dispatch_exit(outcome: std::result::Result<Result<()>, JoinError>) -> bool {
    match outcome {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!("Dispatch loop exited with error: {}", e);
            false
        }
        Err(join) => {
            error!("Dispatch task failed: {}", join);
            false
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let token = CancellationToken::new();
    let config = Config::new().queue_capacity(100).subscriber_capacity(8);
    let broker = Arc::new(Broker::with_config(config, Some(token.clone()))?);

    let runner = broker.clone();
    let dispatch = tokio::spawn(async move { runner.run().await });

    let users = UserManager::with_cancellation(token.clone());
    for user in [
        User::new("Alice", "alice@example.com", "alice"),
        User::new("Bob", "bob@example.com", "bob"),
        User::new("Mallory", "not-an-email", "mallory"),
    ] {
        let id = user.id.clone();
        match users.add(user).await {
            Ok(()) => spawn_reader(&broker, &id).await,
            Err(e) => warn!("Rejected user {}: {}", id, e),
        }
    }

    let store = Arc::new(MemoryStore::new());
    let archive = Archive::start(broker.clone(), "archive", store.clone()).await;

    broker.send(Message::broadcast("alice", "hello everyone")).await?;
    broker.send(Message::direct("alice", "bob", "hi bob")).await?;
    broker.send(Message::direct("bob", "alice", "hi alice")).await?;
    broker.send(Message::direct("bob", "bob", "note to self")).await?;
    broker.send(Message::direct("alice", "mallory", "anyone there?")).await?;

    // Give readers a moment before tearing down.
    tokio::time::sleep(Duration::from_millis(100)).await;

    archive.stop().await;
    token.cancel();
    broker.stopped().await;
    report_dispatch_exit(dispatch.await);

    for stored in store.query(None).await? {
        info!("archived #{} {}: {}", stored.id, stored.sender, stored.content);
    }

    match broker.send(Message::broadcast("alice", "too late")).await {
        Err(e) => info!("Send after shutdown rejected: {}", e),
        Ok(()) => warn!("Send after shutdown unexpectedly accepted"),
    }

    Ok(())
}
