//! Error types for SWOT Core
//!
//! Provides the error taxonomy shared by the engine and its collaborators:
//! - Oracle failures (absorbed per attempt)
//! - Persistence failures (surfaced to the caller)
//! - Invalid options and registry contents
//! - Rejected note edits
//! - Illegal lifecycle transitions

use crate::state_machine::{ControlEvent, TrainingState};
use crate::types::QuestionId;

/// Failure reported by a solve or critique oracle
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    /// The oracle could not be reached or returned a transport error
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    /// The oracle answered but the response could not be interpreted
    #[error("malformed oracle response: {0}")]
    MalformedResponse(String),

    /// The oracle gave up before producing a response
    #[error("oracle timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },
}

impl OracleError {
    /// Check if the same call could succeed when retried later
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout { .. })
    }
}

/// Key-value store failures
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Underlying I/O failed
    #[error("storage I/O failed for key {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Key cannot be mapped onto the backend
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    /// Backend-specific failure
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Options validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OptionsError {
    /// A field that must be a positive integer was zero
    #[error("option `{0}` must be at least 1")]
    NotPositive(&'static str),

    /// Options cannot change while a loop is active
    #[error("options cannot change while training is {0}")]
    Locked(TrainingState),
}

/// Registry construction errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Two entries share the same id
    #[error("duplicate question id: {0}")]
    DuplicateId(QuestionId),

    /// An entry has an empty id
    #[error("question id must not be empty")]
    EmptyId,

    /// The registry cannot be replaced while a loop is active
    #[error("questions cannot be replaced while training is {0}")]
    Locked(TrainingState),
}

/// Note edit rejection
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NoteEditError {
    /// Target question type does not exist
    #[error("question type not found: {0}")]
    QuestionTypeNotFound(String),

    /// Question type id already in use
    #[error("question type already exists: {0}")]
    QuestionTypeExists(String),

    /// Tip index out of range
    #[error("tip index {index} out of range for question type {question_type_id} ({len} tips)")]
    TipOutOfRange {
        question_type_id: String,
        index: usize,
        len: usize,
    },

    /// Edit carries an empty required field
    #[error("empty value for `{0}`")]
    EmptyValue(&'static str),
}

/// Lifecycle errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StateMachineError {
    /// Event not permitted from the current state
    #[error("illegal transition: {event:?} while {from}")]
    IllegalTransition {
        from: TrainingState,
        event: ControlEvent,
    },
}

/// Snapshot encoding errors
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// JSON encoding or decoding failed
    #[error("snapshot serialization failed: {0}")]
    Serde(#[from] serde_json::Error),

    /// Snapshot options do not validate
    #[error("snapshot carries invalid options: {0}")]
    InvalidOptions(#[from] OptionsError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oracle_error_transience() {
        assert!(OracleError::Unavailable("down".to_string()).is_transient());
        assert!(OracleError::Timeout { duration_ms: 10 }.is_transient());
        assert!(!OracleError::MalformedResponse("?".to_string()).is_transient());
    }

    #[test]
    fn illegal_transition_display() {
        let err = StateMachineError::IllegalTransition {
            from: TrainingState::Idle,
            event: ControlEvent::RequestPause,
        };
        assert!(err.to_string().contains("RequestPause"));
        assert!(err.to_string().contains("idle"));
    }

    #[test]
    fn note_edit_error_display() {
        let err = NoteEditError::TipOutOfRange {
            question_type_id: "qt".to_string(),
            index: 4,
            len: 2,
        };
        assert_eq!(
            err.to_string(),
            "tip index 4 out of range for question type qt (2 tips)"
        );
    }
}
