//! Session state
//!
//! The only mutable cross-cutting state of a training session. Owned by the
//! engine and snapshotted for persistence between processes.

use crate::tracker::QuestionStateTracker;
use crate::types::{EndReason, QuestionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Batches of the round in progress
///
/// Kept so a paused or restored session resumes on exactly the questions it
/// had partitioned, even though eligibility changes during the round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundPlan {
    /// Question ids per batch, in execution order
    pub batches: Vec<Vec<QuestionId>>,
}

impl RoundPlan {
    /// Partition ids into consecutive batches of `batch_size`
    #[must_use]
    pub fn partition(ids: &[QuestionId], batch_size: usize) -> Self {
        Self {
            batches: ids.chunks(batch_size.max(1)).map(<[QuestionId]>::to_vec).collect(),
        }
    }

    /// Number of batches
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    /// Whether the plan has no batches
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Batch at `index`
    #[inline]
    #[must_use]
    pub fn batch(&self, index: usize) -> Option<&[QuestionId]> {
        self.batches.get(index).map(Vec::as_slice)
    }
}

/// Aggregate session state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionState {
    /// Completed rounds in the current run
    pub total_loop_count: u32,
    /// Fully-correct batches under the current note version
    pub version_certify_count: u32,
    /// Next batch to run within `round_plan`
    pub last_batch_index: usize,
    /// Round in progress, if any
    pub round_plan: Option<RoundPlan>,
    /// Whether the last run reached a terminal state
    pub ended: bool,
    /// Why the last run stopped
    pub end_reason: Option<EndReason>,
    /// When the current or last run started
    pub start_time: Option<DateTime<Utc>>,
    /// When the last run stopped
    pub end_time: Option<DateTime<Utc>>,
    /// Per-question statistics
    pub questions: QuestionStateTracker,
}

impl SessionState {
    /// Fresh session tracking the given questions
    #[must_use]
    pub fn for_questions<'a>(ids: impl IntoIterator<Item = &'a QuestionId>) -> Self {
        Self {
            questions: QuestionStateTracker::for_questions(ids),
            ..Self::default()
        }
    }

    /// Reset loop and version counters for a new run; question statistics are kept
    pub fn begin_run(&mut self, now: DateTime<Utc>) {
        self.total_loop_count = 0;
        self.version_certify_count = 0;
        self.last_batch_index = 0;
        self.round_plan = None;
        self.ended = false;
        self.end_reason = None;
        self.start_time = Some(now);
        self.end_time = None;
    }

    /// Record a terminal state
    pub fn finish(&mut self, reason: EndReason, now: DateTime<Utc>) {
        self.ended = true;
        self.end_reason = Some(reason);
        self.end_time = Some(now);
        self.round_plan = None;
        self.last_batch_index = 0;
    }

    /// A note merge starts a new version scope
    pub fn begin_version(&mut self) {
        self.version_certify_count = 0;
        self.questions.reset_version_scope();
    }

    /// Clear everything except the set of tracked questions
    pub fn reset(&mut self) {
        self.questions.reset_all();
        *self = Self {
            questions: std::mem::take(&mut self.questions),
            ..Self::default()
        };
    }

    /// Whether a round is partially executed
    #[inline]
    #[must_use]
    pub fn has_pending_round(&self) -> bool {
        self.round_plan.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Options;

    fn ids(names: &[&str]) -> Vec<QuestionId> {
        names.iter().map(|n| QuestionId::from(*n)).collect()
    }

    #[test]
    fn partition_into_batches() {
        let plan = RoundPlan::partition(&ids(&["a", "b", "c", "d", "e"]), 2);
        assert_eq!(plan.len(), 3);
        assert_eq!(plan.batch(2).unwrap(), ids(&["e"]).as_slice());
    }

    #[test]
    fn partition_empty() {
        assert!(RoundPlan::partition(&[], 3).is_empty());
    }

    #[test]
    fn begin_run_keeps_question_statistics() {
        let qs = ids(&["a"]);
        let mut session = SessionState::for_questions(&qs);
        session.questions.record_correct(&qs[0], &Options::default());
        session.total_loop_count = 4;
        session.finish(EndReason::NoEligibleQuestions, Utc::now());

        session.begin_run(Utc::now());
        assert_eq!(session.total_loop_count, 0);
        assert!(!session.ended);
        assert!(session.end_reason.is_none());
        assert_eq!(session.questions.get(&qs[0]).unwrap().correct_count_total, 1);
    }

    #[test]
    fn reset_clears_statistics_but_keeps_questions() {
        let qs = ids(&["a", "b"]);
        let mut session = SessionState::for_questions(&qs);
        session.questions.record_error(&qs[1], &Options::default());
        session.total_loop_count = 2;

        session.reset();
        assert_eq!(session.total_loop_count, 0);
        assert_eq!(session.questions.len(), 2);
        assert_eq!(session.questions.get(&qs[1]).unwrap().error_count_total, 0);
    }

    #[test]
    fn begin_version_resets_certify_count() {
        let qs = ids(&["a"]);
        let mut session = SessionState::for_questions(&qs);
        session.version_certify_count = 3;
        session.questions.record_error(&qs[0], &Options::default());

        session.begin_version();
        assert_eq!(session.version_certify_count, 0);
        let state = session.questions.get(&qs[0]).unwrap();
        assert_eq!(state.error_count_version, 0);
        assert_eq!(state.error_count_total, 1);
    }
}
