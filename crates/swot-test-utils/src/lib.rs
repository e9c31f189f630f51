//! Testing utilities for the SWOT workspace
//!
//! Shared oracles, signal sinks and fixtures for engine tests.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use swot_core::{
    AttemptOutcome, AttemptReport, CritiqueOracle, Note, NoteEdit, NoteEditProposal, Options,
    OracleError, QuestionEntry, QuestionId, Severity, SignalFn, SolveOracle,
};
use tokio::sync::{Notify, Semaphore};

// ----------------------------------------------------------------------------
// Fixtures
// ----------------------------------------------------------------------------

pub fn question(id: &str) -> QuestionEntry {
    QuestionEntry::new(id, serde_json::json!({ "prompt": id }), serde_json::json!(id))
}

pub fn questions(ids: &[&str]) -> Vec<QuestionEntry> {
    ids.iter().map(|id| question(id)).collect()
}

/// Default options without the inter-batch delay
pub fn fast_options() -> Options {
    Options::default().with_batch_delay_ms(0)
}

pub fn qid(id: &str) -> QuestionId {
    QuestionId::from(id)
}

// ----------------------------------------------------------------------------
// Solve oracles
// ----------------------------------------------------------------------------

/// One solve call as seen by a scripted oracle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolveCall {
    pub question: QuestionId,
    /// Tips in the note the attempt was made against
    pub tips: usize,
}

/// Solver that replays per-question outcome queues
///
/// When a question's queue is empty the default outcome is used.
/// `OracleFailure` is returned as an `OracleError`.
pub struct ScriptedSolveOracle {
    scripts: Mutex<HashMap<QuestionId, VecDeque<AttemptOutcome>>>,
    default: AttemptOutcome,
    calls: Mutex<Vec<SolveCall>>,
}

impl ScriptedSolveOracle {
    pub fn new(default: AttemptOutcome) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            default,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn always_correct() -> Self {
        Self::new(AttemptOutcome::Correct)
    }

    pub fn always_incorrect() -> Self {
        Self::new(AttemptOutcome::Incorrect)
    }

    pub fn always_failing() -> Self {
        Self::new(AttemptOutcome::OracleFailure)
    }

    #[must_use]
    pub fn with_script(self, id: &str, outcomes: impl IntoIterator<Item = AttemptOutcome>) -> Self {
        self.scripts
            .lock()
            .entry(qid(id))
            .or_default()
            .extend(outcomes);
        self
    }

    pub fn calls(&self) -> Vec<SolveCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, id: &str) -> usize {
        let id = qid(id);
        self.calls.lock().iter().filter(|c| c.question == id).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl SolveOracle for ScriptedSolveOracle {
    async fn attempt(&self, question: &QuestionEntry, note: &Note) -> Result<AttemptReport, OracleError> {
        self.calls.lock().push(SolveCall {
            question: question.id.clone(),
            tips: note.tip_count(),
        });
        let outcome = self
            .scripts
            .lock()
            .get_mut(&question.id)
            .and_then(VecDeque::pop_front)
            .unwrap_or(self.default);

        match outcome {
            AttemptOutcome::Correct => Ok(AttemptReport::correct(question.answer.to_string())),
            AttemptOutcome::Incorrect => Ok(AttemptReport::incorrect(format!("wrong answer to {}", question.id))),
            AttemptOutcome::OracleFailure => Err(OracleError::Unavailable("scripted failure".to_string())),
        }
    }
}

/// Solver that blocks every attempt until the test releases it
pub struct GatedSolveOracle {
    inner: Arc<dyn SolveOracle>,
    gate: Semaphore,
    entered: AtomicUsize,
    entered_notify: Notify,
}

impl GatedSolveOracle {
    pub fn new(inner: Arc<dyn SolveOracle>) -> Self {
        Self {
            inner,
            gate: Semaphore::new(0),
            entered: AtomicUsize::new(0),
            entered_notify: Notify::new(),
        }
    }

    /// Let `n` more attempts through
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    /// Attempts that have reached the gate so far
    pub fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }

    /// Wait until at least `n` attempts have reached the gate
    pub async fn wait_for_entries(&self, n: usize) {
        loop {
            let notified = self.entered_notify.notified();
            if self.entered() >= n {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl SolveOracle for GatedSolveOracle {
    async fn attempt(&self, question: &QuestionEntry, note: &Note) -> Result<AttemptReport, OracleError> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        self.entered_notify.notify_waiters();
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| OracleError::Unavailable("gate closed".to_string()))?;
        permit.forget();
        self.inner.attempt(question, note).await
    }
}

// ----------------------------------------------------------------------------
// Critique oracles
// ----------------------------------------------------------------------------

/// One critique call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CritiqueCall {
    pub question: QuestionId,
    pub wrong_answer: String,
    pub tips: usize,
}

/// Critic that appends one tip per wrong answer to a `general` question type
pub struct RecordingCritiqueOracle {
    edits: bool,
    calls: Mutex<Vec<CritiqueCall>>,
}

impl RecordingCritiqueOracle {
    pub fn new() -> Self {
        Self {
            edits: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Critic that records calls but proposes nothing
    pub fn without_edits() -> Self {
        Self {
            edits: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<CritiqueCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl Default for RecordingCritiqueOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CritiqueOracle for RecordingCritiqueOracle {
    async fn critique(
        &self,
        question: &QuestionEntry,
        wrong_answer: &str,
        note: &Note,
    ) -> Result<NoteEditProposal, OracleError> {
        self.calls.lock().push(CritiqueCall {
            question: question.id.clone(),
            wrong_answer: wrong_answer.to_string(),
            tips: note.tip_count(),
        });
        if !self.edits {
            return Ok(NoteEditProposal::default());
        }

        let mut edits = Vec::new();
        if note.question_type("general").is_none() {
            edits.push(NoteEdit::CreateQuestionType {
                id: "general".to_string(),
                name: "General".to_string(),
                description: String::new(),
            });
        }
        edits.push(NoteEdit::AppendTip {
            question_type_id: "general".to_string(),
            tip: format!("Re-check {}", question.id),
        });
        Ok(NoteEditProposal::new(edits))
    }
}

/// Critic that always fails
#[derive(Debug, Default)]
pub struct FailingCritiqueOracle {
    calls: AtomicUsize,
}

impl FailingCritiqueOracle {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CritiqueOracle for FailingCritiqueOracle {
    async fn critique(
        &self,
        _question: &QuestionEntry,
        _wrong_answer: &str,
        _note: &Note,
    ) -> Result<NoteEditProposal, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(OracleError::MalformedResponse("unparseable critique".to_string()))
    }
}

// ----------------------------------------------------------------------------
// Signals
// ----------------------------------------------------------------------------

/// Signal sink that keeps every message
#[derive(Clone, Default)]
pub struct RecordingSignal {
    messages: Arc<Mutex<Vec<(String, Severity)>>>,
}

impl RecordingSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal_fn(&self) -> SignalFn {
        let messages = Arc::clone(&self.messages);
        Arc::new(move |message: &str, severity: Severity, _duration: std::time::Duration| {
            messages.lock().push((message.to_string(), severity));
        })
    }

    pub fn messages(&self) -> Vec<(String, Severity)> {
        self.messages.lock().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.messages.lock().iter().any(|(m, _)| m.contains(needle))
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.messages.lock().iter().filter(|(_, s)| *s == severity).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_oracle_replays_then_defaults() {
        let oracle = ScriptedSolveOracle::always_correct()
            .with_script("a", [AttemptOutcome::Incorrect, AttemptOutcome::OracleFailure]);
        let q = question("a");
        let note = Note::default();

        assert_eq!(oracle.attempt(&q, &note).await.unwrap().outcome, AttemptOutcome::Incorrect);
        assert!(oracle.attempt(&q, &note).await.is_err());
        assert_eq!(oracle.attempt(&q, &note).await.unwrap().outcome, AttemptOutcome::Correct);
        assert_eq!(oracle.call_count("a"), 3);
    }

    #[tokio::test]
    async fn recording_critic_creates_type_once() {
        let critic = RecordingCritiqueOracle::new();
        let mut note = Note::default();
        for _ in 0..2 {
            let proposal = critic.critique(&question("a"), "x", &note).await.unwrap();
            for edit in &proposal.edits {
                note.apply(edit).unwrap();
            }
        }
        assert_eq!(note.tip_count(), 2);
        assert_eq!(critic.calls()[1].tips, 1);
    }

    #[test]
    fn recording_signal_collects() {
        let sink = RecordingSignal::new();
        let f = sink.signal_fn();
        f("hello", Severity::Info, std::time::Duration::ZERO);
        assert!(sink.contains("hell"));
        assert_eq!(sink.count(Severity::Info), 1);
    }
}
