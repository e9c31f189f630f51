//! Persistence contract
//!
//! A key-value blob store supplied by the host application. The engine does
//! not retry; retry and timeout policy belong to the implementation.

use crate::error::PersistenceError;
use async_trait::async_trait;

/// Key-value blob store
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Load the blob stored under `key`, `None` if absent
    ///
    /// # Errors
    /// `PersistenceError` if the backend fails
    async fn load(&self, key: &str) -> Result<Option<String>, PersistenceError>;

    /// Store `blob` under `key`, replacing any previous value
    ///
    /// # Errors
    /// `PersistenceError` if the backend fails
    async fn save(&self, key: &str, blob: String) -> Result<(), PersistenceError>;
}
