//! # chat-broker-core
//!
//! In-process message broker for chat delivery.
//!
//! This crate provides:
//! - Direct and broadcast routing between registered subscribers
//! - Non-blocking, best-effort delivery to per-subscriber channels
//! - Graceful shutdown through a shared cancellation token
//! - An append-only message store and an archive subscriber feeding it
//! - A validated user registry

pub mod archive;
pub mod broker;
pub mod config;
pub mod error;
pub mod message;
pub mod store;
pub mod subscriber;
pub mod user;

pub use archive::Archive;
pub use broker::Broker;
pub use config::Config;
pub use error::{Error, Result, ValidationError};
pub use message::{Message, StoredMessage};
pub use store::{MemoryStore, MessageStore};
pub use subscriber::Outbound;
pub use user::{User, UserManager};
pub use tokio_util::sync::CancellationToken;
