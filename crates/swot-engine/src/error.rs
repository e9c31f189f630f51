//! Error types for the SWOT engine
//!
//! Control methods never return these; they report acceptance as `bool`.
//! Errors surface only from configuration, registry loading and snapshot
//! persistence, where the caller owns the retry policy.

use swot_core::{OptionsError, PersistenceError, RegistryError, SnapshotError, TrainingState};

/// Main engine error type
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Options failed validation
    #[error("invalid options: {0}")]
    Options(#[from] OptionsError),

    /// Question set could not be loaded
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Store read or write failed
    #[error("persistence failed: {0}")]
    Persistence(#[from] PersistenceError),

    /// Snapshot could not be encoded or decoded
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// Operation requires a settled engine
    #[error("engine is busy ({0})")]
    Busy(TrainingState),
}

impl EngineError {
    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Busy(_))
    }
}
