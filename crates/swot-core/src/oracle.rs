//! Oracle contracts
//!
//! The engine drives two external, single-shot asynchronous oracles:
//! - [`SolveOracle`]: attempt a question with the current note as context
//! - [`CritiqueOracle`]: analyse a wrong answer and propose note edits
//!
//! Both are injected as trait objects; their internals are opaque.

use crate::error::OracleError;
use crate::note::{Note, NoteEditProposal};
use crate::types::QuestionEntry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result classification of one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Answer matched the ground truth
    Correct,
    /// Answer did not match
    Incorrect,
    /// No usable answer was produced
    OracleFailure,
}

impl AttemptOutcome {
    /// Whether the attempt counts toward statistics
    #[inline]
    #[must_use]
    pub fn is_scored(self) -> bool {
        !matches!(self, Self::OracleFailure)
    }

    /// Stable label for logs and metrics
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Correct => "correct",
            Self::Incorrect => "incorrect",
            Self::OracleFailure => "oracle_failure",
        }
    }
}

/// What the solve oracle returned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptReport {
    /// Classification
    pub outcome: AttemptOutcome,
    /// Raw answer text, forwarded to the critique oracle on failure
    pub raw_response: String,
}

impl AttemptReport {
    /// Correct attempt
    #[inline]
    #[must_use]
    pub fn correct(raw_response: impl Into<String>) -> Self {
        Self {
            outcome: AttemptOutcome::Correct,
            raw_response: raw_response.into(),
        }
    }

    /// Incorrect attempt
    #[inline]
    #[must_use]
    pub fn incorrect(raw_response: impl Into<String>) -> Self {
        Self {
            outcome: AttemptOutcome::Incorrect,
            raw_response: raw_response.into(),
        }
    }

    /// Attempt without a usable answer
    #[inline]
    #[must_use]
    pub fn failure(raw_response: impl Into<String>) -> Self {
        Self {
            outcome: AttemptOutcome::OracleFailure,
            raw_response: raw_response.into(),
        }
    }
}

impl From<Result<AttemptReport, OracleError>> for AttemptReport {
    fn from(result: Result<AttemptReport, OracleError>) -> Self {
        result.unwrap_or_else(|e| Self::failure(e.to_string()))
    }
}

/// Attempts a question
#[async_trait]
pub trait SolveOracle: Send + Sync {
    /// Answer `question` using `note` as guidance
    ///
    /// # Errors
    /// Any `OracleError`; the engine records it as an `OracleFailure` attempt.
    async fn attempt(&self, question: &QuestionEntry, note: &Note) -> Result<AttemptReport, OracleError>;
}

/// Critiques a wrong answer
#[async_trait]
pub trait CritiqueOracle: Send + Sync {
    /// Propose note edits that would have prevented `wrong_answer`
    ///
    /// # Errors
    /// Any `OracleError`; the engine logs it and keeps the note unchanged.
    async fn critique(
        &self,
        question: &QuestionEntry,
        wrong_answer: &str,
        note: &Note,
    ) -> Result<NoteEditProposal, OracleError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oracle_error_maps_to_failure() {
        let report: AttemptReport = Err(OracleError::Unavailable("503".to_string())).into();
        assert_eq!(report.outcome, AttemptOutcome::OracleFailure);
        assert!(report.raw_response.contains("503"));
    }

    #[test]
    fn scored_outcomes() {
        assert!(AttemptOutcome::Correct.is_scored());
        assert!(AttemptOutcome::Incorrect.is_scored());
        assert!(!AttemptOutcome::OracleFailure.is_scored());
        assert_eq!(AttemptOutcome::OracleFailure.as_str(), "oracle_failure");
    }
}
