//! Question state tracker
//!
//! Per-question counters and simple/skip classification. Counters live in two
//! scopes:
//! - **Version**: reset whenever the note version changes
//! - **Total**: monotonic until an explicit session reset
//!
//! Within each scope `trained = correct + error` holds after every update.

use crate::options::Options;
use crate::types::QuestionId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Counters and flags for one question
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct QuestionTrainingState {
    pub trained_count_version: u32,
    pub trained_count_total: u32,
    pub correct_count_version: u32,
    pub correct_count_total: u32,
    pub error_count_version: u32,
    pub error_count_total: u32,
    pub is_simple_version: bool,
    pub is_simple_total: bool,
    pub is_skip_version: bool,
    pub is_skip_total: bool,
}

impl QuestionTrainingState {
    /// Record a correct answer
    pub fn record_correct(&mut self, options: &Options) {
        self.trained_count_version += 1;
        self.trained_count_total += 1;
        self.correct_count_version += 1;
        self.correct_count_total += 1;

        // Equality means the question has never been wrong in this scope.
        if self.trained_count_version == self.correct_count_version
            && self.correct_count_version >= options.version_simple_threshold
        {
            self.is_simple_version = true;
        }
        if self.trained_count_total == self.correct_count_total
            && self.correct_count_total >= options.total_simple_threshold
        {
            self.is_simple_total = true;
        }
    }

    /// Record a wrong answer
    pub fn record_error(&mut self, options: &Options) {
        self.trained_count_version += 1;
        self.trained_count_total += 1;
        self.error_count_version += 1;
        self.error_count_total += 1;

        // A question already simple in a scope is never also skipped in it.
        if !self.is_simple_version && self.error_count_version >= options.version_skip_threshold {
            self.is_skip_version = true;
        }
        if !self.is_simple_total && self.error_count_total >= options.total_skip_threshold {
            self.is_skip_total = true;
        }
    }

    /// Whether the question may be selected into the next batch
    #[must_use]
    pub fn is_eligible(&self, options: &Options) -> bool {
        !(self.is_skip_version || self.is_skip_total || self.is_simple_version || self.is_simple_total)
            && self.trained_count_version < options.max_verify_count
    }

    /// Clear version-scoped counters and flags
    pub fn reset_version(&mut self) {
        self.trained_count_version = 0;
        self.correct_count_version = 0;
        self.error_count_version = 0;
        self.is_simple_version = false;
        self.is_skip_version = false;
    }

    /// Whether `trained = correct + error` holds in both scopes
    #[must_use]
    pub fn counters_consistent(&self) -> bool {
        self.trained_count_version == self.correct_count_version + self.error_count_version
            && self.trained_count_total == self.correct_count_total + self.error_count_total
    }
}

/// Aggregate classification counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerSummary {
    /// Questions tracked
    pub total: usize,
    /// Questions selectable for the next batch
    pub eligible: usize,
    /// Questions marked simple in either scope
    pub simple: usize,
    /// Questions marked skipped in either scope
    pub skipped: usize,
    /// Questions at their per-version attempt cap
    pub capped: usize,
}

/// All question states of a session, in registry order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionStateTracker {
    states: IndexMap<QuestionId, QuestionTrainingState>,
}

impl QuestionStateTracker {
    /// Create an empty tracker
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh state for each id
    #[must_use]
    pub fn for_questions<'a>(ids: impl IntoIterator<Item = &'a QuestionId>) -> Self {
        Self {
            states: ids
                .into_iter()
                .map(|id| (id.clone(), QuestionTrainingState::default()))
                .collect(),
        }
    }

    /// Align with a registry: keep known states, add fresh ones, drop unknown ids
    pub fn sync_with<'a>(&mut self, ids: impl IntoIterator<Item = &'a QuestionId>) {
        let mut synced = IndexMap::new();
        for id in ids {
            let state = self.states.swap_remove(id).unwrap_or_default();
            synced.insert(id.clone(), state);
        }
        self.states = synced;
    }

    /// State for a question
    #[inline]
    #[must_use]
    pub fn get(&self, id: &QuestionId) -> Option<&QuestionTrainingState> {
        self.states.get(id)
    }

    /// Record a correct answer, creating the state if needed
    pub fn record_correct(&mut self, id: &QuestionId, options: &Options) {
        self.entry(id).record_correct(options);
    }

    /// Record a wrong answer, creating the state if needed
    pub fn record_error(&mut self, id: &QuestionId, options: &Options) {
        self.entry(id).record_error(options);
    }

    /// Whether a question may be selected; unknown ids are treated as fresh
    #[must_use]
    pub fn is_eligible(&self, id: &QuestionId, options: &Options) -> bool {
        self.states
            .get(id)
            .map_or(QuestionTrainingState::default().is_eligible(options), |s| {
                s.is_eligible(options)
            })
    }

    /// Eligible ids in tracker order
    #[must_use]
    pub fn eligible_ids(&self, options: &Options) -> Vec<QuestionId> {
        self.states
            .iter()
            .filter(|(_, state)| state.is_eligible(options))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Start a fresh version scope for every question
    pub fn reset_version_scope(&mut self) {
        for state in self.states.values_mut() {
            state.reset_version();
        }
    }

    /// Clear every counter and flag
    pub fn reset_all(&mut self) {
        for state in self.states.values_mut() {
            *state = QuestionTrainingState::default();
        }
    }

    /// Classification counts
    #[must_use]
    pub fn summary(&self, options: &Options) -> TrackerSummary {
        let mut summary = TrackerSummary {
            total: self.states.len(),
            ..TrackerSummary::default()
        };
        for state in self.states.values() {
            if state.is_eligible(options) {
                summary.eligible += 1;
            }
            if state.is_simple_version || state.is_simple_total {
                summary.simple += 1;
            }
            if state.is_skip_version || state.is_skip_total {
                summary.skipped += 1;
            }
            if state.trained_count_version >= options.max_verify_count {
                summary.capped += 1;
            }
        }
        summary
    }

    /// Iterate states in order
    pub fn iter(&self) -> impl Iterator<Item = (&QuestionId, &QuestionTrainingState)> {
        self.states.iter()
    }

    /// Number of tracked questions
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether nothing is tracked
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    fn entry(&mut self, id: &QuestionId) -> &mut QuestionTrainingState {
        self.states.entry(id.clone()).or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn options() -> Options {
        Options::default()
            .with_simple_thresholds(3, 5)
            .with_skip_thresholds(2, 4)
            .with_max_verify_count(10)
    }

    #[test]
    fn simple_flag_at_threshold() {
        let opts = options();
        let mut state = QuestionTrainingState::default();

        state.record_correct(&opts);
        state.record_correct(&opts);
        assert!(!state.is_simple_version);

        state.record_correct(&opts);
        assert!(state.is_simple_version);
        assert!(!state.is_simple_total);
    }

    #[test]
    fn single_error_disqualifies_simple_until_version_reset() {
        let opts = options();
        let mut state = QuestionTrainingState::default();

        state.record_correct(&opts);
        state.record_correct(&opts);
        state.record_error(&opts);
        for _ in 0..5 {
            state.record_correct(&opts);
        }
        assert!(!state.is_simple_version);

        state.reset_version();
        state.record_correct(&opts);
        state.record_correct(&opts);
        assert!(!state.is_simple_version);
        state.record_correct(&opts);
        assert!(state.is_simple_version);
    }

    #[test]
    fn skip_flag_at_threshold() {
        let opts = options();
        let mut state = QuestionTrainingState::default();

        state.record_error(&opts);
        assert!(!state.is_skip_version);

        state.record_error(&opts);
        assert!(state.is_skip_version);
        assert!(!state.is_skip_total);
    }

    #[test]
    fn version_reset_keeps_total_scope() {
        let opts = options().with_skip_thresholds(1, 1);
        let mut state = QuestionTrainingState::default();

        state.record_error(&opts);
        assert!(state.is_skip_version && state.is_skip_total);

        state.reset_version();
        assert!(!state.is_skip_version);
        assert!(state.is_skip_total);
        assert_eq!(state.trained_count_version, 0);
        assert_eq!(state.trained_count_total, 1);
    }

    #[test]
    fn errors_after_simple_do_not_mark_skip() {
        let opts = options();
        let mut state = QuestionTrainingState::default();

        for _ in 0..3 {
            state.record_correct(&opts);
        }
        state.record_error(&opts);
        state.record_error(&opts);
        assert!(state.is_simple_version);
        assert!(!state.is_skip_version);
        assert_eq!(state.error_count_version, 2);
        assert!(state.counters_consistent());

        // A fresh version scope can still be skipped
        state.reset_version();
        state.record_error(&opts);
        state.record_error(&opts);
        assert!(state.is_skip_version);
    }

    #[test]
    fn skip_total_excludes_regardless_of_version_flags() {
        let opts = options();
        let state = QuestionTrainingState {
            is_skip_total: true,
            ..QuestionTrainingState::default()
        };
        assert!(!state.is_eligible(&opts));
    }

    #[test]
    fn verify_cap_excludes() {
        let opts = options().with_max_verify_count(2).with_skip_thresholds(5, 5);
        let mut state = QuestionTrainingState::default();

        state.record_error(&opts);
        assert!(state.is_eligible(&opts));
        state.record_error(&opts);
        assert!(!state.is_eligible(&opts));

        state.reset_version();
        assert!(state.is_eligible(&opts));
    }

    #[test]
    fn tracker_sync_keeps_known_states() {
        let opts = options();
        let a = QuestionId::from("a");
        let b = QuestionId::from("b");
        let c = QuestionId::from("c");

        let mut tracker = QuestionStateTracker::for_questions([&a, &b]);
        tracker.record_correct(&a, &opts);

        tracker.sync_with([&c, &a]);
        assert_eq!(tracker.len(), 2);
        assert_eq!(tracker.get(&a).unwrap().correct_count_total, 1);
        assert!(tracker.get(&b).is_none());
        let order: Vec<&QuestionId> = tracker.iter().map(|(id, _)| id).collect();
        assert_eq!(order, vec![&c, &a]);
    }

    #[test]
    fn tracker_summary_counts() {
        let opts = options().with_skip_thresholds(1, 1);
        let a = QuestionId::from("a");
        let b = QuestionId::from("b");
        let mut tracker = QuestionStateTracker::for_questions([&a, &b]);

        tracker.record_error(&a, &opts);
        let summary = tracker.summary(&opts);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.eligible, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(tracker.eligible_ids(&opts), vec![b]);
    }

    #[test]
    fn tracker_reset_all() {
        let opts = options();
        let a = QuestionId::from("a");
        let mut tracker = QuestionStateTracker::for_questions([&a]);
        tracker.record_error(&a, &opts);
        tracker.reset_all();
        assert_eq!(tracker.get(&a), Some(&QuestionTrainingState::default()));
    }

    proptest! {
        #[test]
        fn prop_counters_stay_consistent(
            outcomes in proptest::collection::vec(any::<bool>(), 0..64),
            resets in proptest::collection::vec(any::<bool>(), 0..64),
        ) {
            let opts = options();
            let mut state = QuestionTrainingState::default();
            for (i, correct) in outcomes.iter().enumerate() {
                if *correct {
                    state.record_correct(&opts);
                } else {
                    state.record_error(&opts);
                }
                if resets.get(i).copied().unwrap_or(false) {
                    state.reset_version();
                }
                prop_assert!(state.counters_consistent());
                prop_assert!(state.correct_count_total <= state.trained_count_total);
            }
        }

        #[test]
        fn prop_flags_are_monotonic_within_scope(
            outcomes in proptest::collection::vec(any::<bool>(), 0..64),
        ) {
            let opts = options();
            let mut state = QuestionTrainingState::default();
            let mut seen_simple = false;
            let mut seen_skip = false;
            for correct in outcomes {
                if correct {
                    state.record_correct(&opts);
                } else {
                    state.record_error(&opts);
                }
                if seen_simple {
                    prop_assert!(state.is_simple_version);
                }
                if seen_skip {
                    prop_assert!(state.is_skip_version);
                }
                seen_simple |= state.is_simple_version;
                seen_skip |= state.is_skip_version;
                prop_assert!(!(state.is_simple_version && state.is_skip_version));
                prop_assert!(!(state.is_simple_total && state.is_skip_total));
            }
        }
    }
}
