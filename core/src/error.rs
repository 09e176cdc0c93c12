//! Error types for chat-broker-core

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in chat-broker-core
#[derive(Error, Debug)]
pub enum Error {
    /// The broker (or a component sharing its token) has been cancelled
    #[error("broker context canceled")]
    Cancelled,

    /// Identity failed validation
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Lookup miss on a user or stored message
    #[error("not found: {0}")]
    NotFound(String),

    /// Message store backend failed
    #[error("store error: {0}")]
    Store(String),

    /// `run` was invoked on a broker whose dispatch loop already owns the queue
    #[error("dispatch loop already running")]
    AlreadyRunning,

    /// JSON serialization/deserialization failed
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Reasons a [`User`](crate::user::User) is rejected
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("name cannot be empty")]
    EmptyName,

    #[error("id cannot be empty")]
    EmptyId,

    #[error("invalid email")]
    InvalidEmail,
}
