//! Batch records and engine statistics
//!
//! Runtime bookkeeping for observers. Not part of the persisted snapshot.

use chrono::{DateTime, Utc};
use serde::Serialize;
use swot_core::{AttemptOutcome, QuestionId, RunId, VersionTag};

/// Maximum number of batch records retained
pub const RECENT_BATCH_CAPACITY: usize = 64;

/// One completed batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchRecord {
    /// Run the batch belonged to
    pub run_id: RunId,
    /// Round number (`totalLoopCount` when the batch ran)
    pub round: u32,
    /// Position within the round plan
    pub batch_index: usize,
    /// Note version the attempts were made against
    pub version: VersionTag,
    /// Attempt outcomes in batch order
    pub attempts: Vec<(QuestionId, AttemptOutcome)>,
    /// Note versions produced by critiques of this batch
    pub revisions: usize,
    /// When the batch committed
    pub finished_at: DateTime<Utc>,
}

impl BatchRecord {
    /// Number of attempts with a given outcome
    #[must_use]
    pub fn count(&self, outcome: AttemptOutcome) -> usize {
        self.attempts.iter().filter(|(_, o)| *o == outcome).count()
    }

    /// Whether the question was attempted in this batch
    #[must_use]
    pub fn contains(&self, id: &QuestionId) -> bool {
        self.attempts.iter().any(|(q, _)| q == id)
    }
}

/// Cumulative counts across every run of an engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// Batches committed
    pub batches: u64,
    /// Solve oracle calls
    pub attempts: u64,
    /// Correct attempts
    pub correct: u64,
    /// Incorrect attempts
    pub incorrect: u64,
    /// Attempts without a usable answer
    pub oracle_failures: u64,
    /// Critique oracle calls
    pub critiques: u64,
    /// Critique oracle calls that failed
    pub critique_failures: u64,
    /// Note versions produced
    pub revisions: u64,
}

impl EngineStats {
    /// Count one attempt
    pub fn record_attempt(&mut self, outcome: AttemptOutcome) {
        self.attempts += 1;
        match outcome {
            AttemptOutcome::Correct => self.correct += 1,
            AttemptOutcome::Incorrect => self.incorrect += 1,
            AttemptOutcome::OracleFailure => self.oracle_failures += 1,
        }
        metrics::counter!("swot_attempts_total", "outcome" => outcome.as_str()).increment(1);
    }

    /// Fraction of scored attempts that were correct
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn accuracy(&self) -> Option<f64> {
        let scored = self.correct + self.incorrect;
        (scored > 0).then(|| self.correct as f64 / scored as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_accuracy_ignores_failures() {
        let mut stats = EngineStats::default();
        assert_eq!(stats.accuracy(), None);

        stats.record_attempt(AttemptOutcome::Correct);
        stats.record_attempt(AttemptOutcome::Incorrect);
        stats.record_attempt(AttemptOutcome::OracleFailure);

        assert_eq!(stats.attempts, 3);
        assert_eq!(stats.accuracy(), Some(0.5));
    }

    #[test]
    fn batch_record_counts() {
        let record = BatchRecord {
            run_id: RunId::new(),
            round: 0,
            batch_index: 0,
            version: VersionTag::generate(),
            attempts: vec![
                (QuestionId::from("a"), AttemptOutcome::Correct),
                (QuestionId::from("b"), AttemptOutcome::Incorrect),
            ],
            revisions: 1,
            finished_at: Utc::now(),
        };
        assert_eq!(record.count(AttemptOutcome::Correct), 1);
        assert!(record.contains(&QuestionId::from("b")));
        assert!(!record.contains(&QuestionId::from("c")));
    }
}
