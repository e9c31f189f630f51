//! Core types for SWOT
//!
//! Defines the fundamental identifiers and records shared across the workspace:
//! - Question identifiers and entries
//! - Training run identifiers
//! - Termination reasons
//! - Signal severities

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Opaque, unique question identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(pub String);

impl QuestionId {
    /// Create a question id
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QuestionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QuestionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for QuestionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identifier of one `start()` of the training loop (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(pub Ulid);

impl RunId {
    /// Generate new run ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A question the engine trains on
///
/// Immutable for the lifetime of a registry. `content` and `answer` are opaque
/// to the engine and only interpreted by the oracles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionEntry {
    /// Unique id
    pub id: QuestionId,
    /// Structured question payload
    pub content: serde_json::Value,
    /// Ground truth
    pub answer: serde_json::Value,
    /// Optional worked explanation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explain: Option<String>,
}

impl QuestionEntry {
    /// Create new entry
    #[inline]
    #[must_use]
    pub fn new(
        id: impl Into<QuestionId>,
        content: serde_json::Value,
        answer: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            content,
            answer,
            explain: None,
        }
    }

    /// With explanation
    #[inline]
    #[must_use]
    pub fn with_explain(mut self, explain: impl Into<String>) -> Self {
        self.explain = Some(explain.into());
        self
    }
}

/// Why a training session stopped
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum EndReason {
    /// `totalLoopCount` reached `maxLoopCount`
    LoopBudgetExhausted,
    /// Every question is simple, skipped or over its attempt cap
    NoEligibleQuestions,
    /// Every attempt of a batch failed at the oracle
    AllAttemptsFailed,
    /// The current note version passed `maxCertifyCount` clean batches
    NoteCertified,
    /// Aborted by the caller
    Aborted(String),
}

impl EndReason {
    /// Whether the session stopped on its own rather than by request
    #[inline]
    #[must_use]
    pub fn is_natural(&self) -> bool {
        !matches!(self, Self::Aborted(_))
    }

    /// Whether the session stopped because the oracle was unusable
    #[inline]
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::AllAttemptsFailed)
    }
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LoopBudgetExhausted => f.write_str("loop budget exhausted"),
            Self::NoEligibleQuestions => f.write_str("no eligible questions"),
            Self::AllAttemptsFailed => f.write_str("all attempts failed"),
            Self::NoteCertified => f.write_str("note version certified"),
            Self::Aborted(reason) => f.write_str(reason),
        }
    }
}

/// Severity attached to observability signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational
    Info,
    /// Something finished well
    Success,
    /// Degraded but continuing
    Warning,
    /// Failure
    Error,
}
