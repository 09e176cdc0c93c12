//! Subscriber identities
//!
//! Validated users kept behind the same read/write-lock discipline as the
//! broker's subscriber map.

use crate::error::ValidationError;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A chat participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub email: String,
    pub id: String,
}

impl User {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            id: id.into(),
        }
    }

    /// Check name, id and email shape
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.id.trim().is_empty() {
            return Err(ValidationError::EmptyId);
        }
        if !self.email.contains('@') {
            return Err(ValidationError::InvalidEmail);
        }
        Ok(())
    }
}

/// Registry of validated users keyed by id
#[derive(Default)]
pub struct UserManager {
    cancel: Option<CancellationToken>,
    users: RwLock<HashMap<String, User>>,
}

impl UserManager {
    /// Create a manager that is never cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manager whose `add` fails once `cancel` fires
    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self {
            cancel: Some(cancel),
            users: RwLock::new(HashMap::new()),
        }
    }

    /// Validate and insert a user, replacing any previous one with the same id
    pub async fn add(&self, user: User) -> Result<()> {
        if self.cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
            return Err(Error::Cancelled);
        }

        user.validate()?;

        let mut users = self.users.write().await;
        debug!("Adding user {}", user.id);
        users.insert(user.id.clone(), user);
        Ok(())
    }

    /// Remove a user by id
    pub async fn remove(&self, id: &str) -> Result<()> {
        let mut users = self.users.write().await;
        users
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("user {}", id)))
    }

    /// Look up a user by id
    pub async fn get(&self, id: &str) -> Result<User> {
        let users = self.users.read().await;
        users
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("user {}", id)))
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}
