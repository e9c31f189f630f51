//! Training engine
//!
//! Owns the session state, the note version store and the lifecycle, and
//! exposes the control surface used by the host application:
//! - `start`, `resume`, `request_pause`, `cancel_pause_request`,
//!   `request_abort`, `reset` report acceptance as `bool`
//! - `assign_options`, `load_questions` and snapshot I/O return `Result`
//! - read accessors return owned copies
//!
//! The loop itself lives in [`crate::scheduler`]. All shared state sits behind
//! one mutex that is never held across an `.await`; signals are queued while
//! locked and emitted after the guard is released.

use crate::error::EngineError;
use crate::record::{BatchRecord, EngineStats, RECENT_BATCH_CAPACITY};
use chrono::Utc;
use parking_lot::{Mutex, MutexGuard};
use std::collections::VecDeque;
use std::sync::Arc;
use swot_core::state_machine::transition;
use swot_core::{
    ControlEvent, CritiqueOracle, EndReason, EngineSnapshot, Note, NoteVersionStore, Options,
    OptionsError, OptionsPatch, Persistence, QuestionEntry, QuestionId, QuestionRegistry,
    QuestionTrainingState, RegistryError, RunId, SessionState, Severity, SignalFn, SolveOracle,
    TrackerSummary, TrainingState, SNAPSHOT_FORMAT,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Mutable engine state, guarded by one mutex
#[derive(Debug)]
pub(crate) struct EngineState {
    pub(crate) training_state: TrainingState,
    pub(crate) options: Options,
    pub(crate) registry: QuestionRegistry,
    pub(crate) session: SessionState,
    pub(crate) note: NoteVersionStore,
    /// Bumped whenever a loop task is spawned; older tasks exit on mismatch
    pub(crate) epoch: u64,
    pub(crate) run_id: Option<RunId>,
    pub(crate) batch_in_flight: bool,
    pub(crate) abort_reason: Option<String>,
    pub(crate) stats: EngineStats,
    pub(crate) recent_batches: VecDeque<BatchRecord>,
    /// Signals queued under the lock, emitted after release
    pub(crate) outbox: Vec<(String, Severity)>,
}

impl EngineState {
    pub(crate) fn signal(&mut self, message: impl Into<String>, severity: Severity) {
        self.outbox.push((message.into(), severity));
    }

    pub(crate) fn push_batch(&mut self, record: BatchRecord) {
        if self.recent_batches.len() == RECENT_BATCH_CAPACITY {
            self.recent_batches.pop_front();
        }
        self.recent_batches.push_back(record);
        self.stats.batches += 1;
    }

    fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            format: SNAPSHOT_FORMAT,
            training_state: self.training_state,
            options: self.options.clone(),
            session: self.session.clone(),
            note: self.note.clone(),
        }
    }
}

/// Shared engine internals
pub(crate) struct EngineInner {
    pub(crate) state: Mutex<EngineState>,
    pub(crate) solver: Arc<dyn SolveOracle>,
    pub(crate) critic: Arc<dyn CritiqueOracle>,
    pub(crate) signal: SignalFn,
    pub(crate) store: Option<(Arc<dyn Persistence>, String)>,
    pub(crate) state_tx: watch::Sender<TrainingState>,
    pub(crate) task: Mutex<Option<JoinHandle<()>>>,
}

/// Builder for [`TrainingEngine`]
pub struct EngineBuilder {
    solver: Arc<dyn SolveOracle>,
    critic: Arc<dyn CritiqueOracle>,
    options: Options,
    questions: Vec<QuestionEntry>,
    note: Option<Note>,
    signal: Option<SignalFn>,
    store: Option<(Arc<dyn Persistence>, String)>,
}

impl EngineBuilder {
    /// With options
    #[must_use]
    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// With initial questions
    #[must_use]
    pub fn with_questions(mut self, questions: Vec<QuestionEntry>) -> Self {
        self.questions = questions;
        self
    }

    /// With an initial note instead of an empty one
    #[must_use]
    pub fn with_note(mut self, note: Note) -> Self {
        self.note = Some(note);
        self
    }

    /// With observability hook
    #[must_use]
    pub fn with_signal(mut self, signal: SignalFn) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Save a snapshot under `key` whenever the engine pauses or stops
    #[must_use]
    pub fn with_persistence(mut self, store: Arc<dyn Persistence>, key: impl Into<String>) -> Self {
        self.store = Some((store, key.into()));
        self
    }

    /// Build the engine
    ///
    /// # Errors
    /// - `EngineError::Options` if options do not validate
    /// - `EngineError::Registry` if question ids are empty or duplicated
    pub fn build(self) -> Result<TrainingEngine, EngineError> {
        self.options.validate()?;
        let registry = QuestionRegistry::from_entries(self.questions)?;
        let session = SessionState::for_questions(registry.ids());
        let note = self.note.map_or_else(NoteVersionStore::new, NoteVersionStore::with_note);
        let (state_tx, _) = watch::channel(TrainingState::Idle);

        let state = EngineState {
            training_state: TrainingState::Idle,
            options: self.options,
            registry,
            session,
            note,
            epoch: 0,
            run_id: None,
            batch_in_flight: false,
            abort_reason: None,
            stats: EngineStats::default(),
            recent_batches: VecDeque::with_capacity(RECENT_BATCH_CAPACITY),
            outbox: Vec::new(),
        };

        Ok(TrainingEngine {
            inner: Arc::new(EngineInner {
                state: Mutex::new(state),
                solver: self.solver,
                critic: self.critic,
                signal: self.signal.unwrap_or_else(swot_core::tracing_signal),
                store: self.store,
                state_tx,
                task: Mutex::new(None),
            }),
        })
    }
}

/// The training control engine
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct TrainingEngine {
    pub(crate) inner: Arc<EngineInner>,
}

impl std::fmt::Debug for TrainingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainingEngine")
            .field("training_state", &self.training_state())
            .finish_non_exhaustive()
    }
}

impl TrainingEngine {
    /// Start building an engine around two oracles
    #[must_use]
    pub fn builder(solver: Arc<dyn SolveOracle>, critic: Arc<dyn CritiqueOracle>) -> EngineBuilder {
        EngineBuilder {
            solver,
            critic,
            options: Options::default(),
            questions: Vec::new(),
            note: None,
            signal: None,
            store: None,
        }
    }

    // ------------------------------------------------------------------
    // Control surface
    // ------------------------------------------------------------------

    /// Begin a new run from `Idle`, `Ended` or `Aborted`
    ///
    /// Resets loop and version counters; question statistics are kept.
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> bool {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::error!("start() called outside a Tokio runtime");
            return false;
        };

        let mut st = self.inner.state.lock();
        let Ok(next) = transition(st.training_state, ControlEvent::Start) else {
            tracing::debug!("start rejected while {}", st.training_state);
            return false;
        };

        st.session.begin_run(Utc::now());
        st.abort_reason = None;
        let run_id = RunId::new();
        st.run_id = Some(run_id);
        let epoch = self.advance(&mut st, next);
        tracing::info!(%run_id, questions = st.registry.len(), "Training started");
        st.signal("Training started", Severity::Info);
        self.flush(st);

        self.spawn_loop(&runtime, epoch);
        true
    }

    /// Continue a paused run at the next unexecuted batch
    ///
    /// Must be called from within a Tokio runtime.
    pub fn resume(&self) -> bool {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::error!("resume() called outside a Tokio runtime");
            return false;
        };

        let mut st = self.inner.state.lock();
        let Ok(next) = transition(st.training_state, ControlEvent::Resume) else {
            tracing::debug!("resume rejected while {}", st.training_state);
            return false;
        };

        if st.run_id.is_none() {
            st.run_id = Some(RunId::new());
        }
        let epoch = self.advance(&mut st, next);
        tracing::info!(batch = st.session.last_batch_index, "Training resumed");
        st.signal("Training resumed", Severity::Info);
        self.flush(st);

        self.spawn_loop(&runtime, epoch);
        true
    }

    /// Ask the loop to pause at the next batch boundary
    pub fn request_pause(&self) -> bool {
        let mut st = self.inner.state.lock();
        let Ok(next) = transition(st.training_state, ControlEvent::RequestPause) else {
            tracing::debug!("pause rejected while {}", st.training_state);
            return false;
        };
        self.set_state(&mut st, next);
        tracing::info!("Pause requested");
        st.signal("Pausing after the current batch", Severity::Info);
        self.flush(st);
        true
    }

    /// Withdraw a pause request that has not reached a boundary yet
    pub fn cancel_pause_request(&self) -> bool {
        let mut st = self.inner.state.lock();
        let Ok(next) = transition(st.training_state, ControlEvent::CancelPauseRequest) else {
            tracing::debug!("cancel pause rejected while {}", st.training_state);
            return false;
        };
        self.set_state(&mut st, next);
        tracing::info!("Pause request cancelled");
        st.signal("Pause cancelled", Severity::Info);
        self.flush(st);
        true
    }

    /// Abort the run
    ///
    /// Finalizes immediately when no batch is in flight; otherwise the loop
    /// finalizes once the in-flight batch commits.
    pub fn request_abort(&self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        let mut st = self.inner.state.lock();
        let Ok(next) = transition(st.training_state, ControlEvent::RequestAbort) else {
            tracing::debug!("abort rejected while {}", st.training_state);
            return false;
        };
        self.set_state(&mut st, next);
        tracing::info!(%reason, "Abort requested");
        st.abort_reason = Some(reason);

        let finalized = !st.batch_in_flight;
        if finalized {
            self.finalize_abort(&mut st);
        } else {
            st.signal("Aborting after the current batch", Severity::Warning);
        }
        self.flush(st);

        if finalized {
            self.persist_in_background();
        }
        true
    }

    /// Clear all statistics and counters, returning to `Idle`
    ///
    /// The question set and the note are kept.
    pub fn reset(&self) -> bool {
        let mut st = self.inner.state.lock();
        let Ok(next) = transition(st.training_state, ControlEvent::Reset) else {
            tracing::debug!("reset rejected while {}", st.training_state);
            return false;
        };
        st.session.reset();
        st.abort_reason = None;
        st.run_id = None;
        st.recent_batches.clear();
        // Invalidate any loop task still winding down.
        self.advance(&mut st, next);
        tracing::info!("Session reset");
        st.signal("Training reset", Severity::Info);
        self.flush(st);
        true
    }

    /// Merge a partial options update
    ///
    /// # Errors
    /// - `OptionsError::Locked` while a loop task is active
    /// - `OptionsError::NotPositive` if the merged options do not validate
    pub fn assign_options(&self, patch: &OptionsPatch) -> Result<(), OptionsError> {
        let mut st = self.inner.state.lock();
        if st.training_state.is_active() {
            return Err(OptionsError::Locked(st.training_state));
        }
        st.options.apply(patch)?;
        tracing::debug!(options = ?st.options, "Options updated");
        Ok(())
    }

    /// Replace the question set
    ///
    /// Statistics of ids present in both sets are kept; new ids start fresh.
    ///
    /// # Errors
    /// - `RegistryError::Locked` unless the engine is `Idle`, `Ended` or `Aborted`
    /// - `RegistryError::DuplicateId` / `EmptyId` for invalid entries
    pub fn load_questions(&self, questions: Vec<QuestionEntry>) -> Result<(), RegistryError> {
        let registry = QuestionRegistry::from_entries(questions)?;
        let mut st = self.inner.state.lock();
        if !matches!(
            st.training_state,
            TrainingState::Idle | TrainingState::Ended | TrainingState::Aborted
        ) {
            return Err(RegistryError::Locked(st.training_state));
        }
        st.session.questions.sync_with(registry.ids());
        st.session.round_plan = None;
        st.session.last_batch_index = 0;
        tracing::info!(count = registry.len(), "Questions loaded");
        st.registry = registry;
        Ok(())
    }

    /// Write a snapshot of the session to `store`
    ///
    /// # Errors
    /// `EngineError::Snapshot` or `EngineError::Persistence`
    pub async fn save_snapshot(&self, store: &dyn Persistence, key: &str) -> Result<(), EngineError> {
        let json = self.snapshot().to_json()?;
        store.save(key, json).await?;
        tracing::debug!(key, "Snapshot saved");
        Ok(())
    }

    /// Restore a snapshot from `store`
    ///
    /// Returns `false` if nothing is stored under `key`. A snapshot captured
    /// mid-run restores as `Paused`.
    ///
    /// # Errors
    /// - `EngineError::Busy` while a loop task is active
    /// - `EngineError::Persistence` / `EngineError::Snapshot` on I/O or decode failure
    pub async fn load_snapshot(&self, store: &dyn Persistence, key: &str) -> Result<bool, EngineError> {
        let state = self.training_state();
        if state.is_active() {
            return Err(EngineError::Busy(state));
        }
        let Some(json) = store.load(key).await? else {
            return Ok(false);
        };
        let snapshot = EngineSnapshot::from_json(&json)?;
        self.restore(snapshot)?;
        tracing::info!(key, "Snapshot restored");
        Ok(true)
    }

    /// Replace session, options and note from a snapshot
    ///
    /// # Errors
    /// `EngineError::Busy` while a loop task is active
    pub fn restore(&self, snapshot: EngineSnapshot) -> Result<(), EngineError> {
        let mut st = self.inner.state.lock();
        if st.training_state.is_active() {
            return Err(EngineError::Busy(st.training_state));
        }
        let restored = snapshot.restored_state();
        st.options = snapshot.options;
        st.session = snapshot.session;
        if !st.registry.is_empty() {
            let EngineState { registry, session, .. } = &mut *st;
            session.questions.sync_with(registry.ids());
        }
        st.note = snapshot.note;
        st.abort_reason = None;
        self.advance(&mut st, restored);
        st.signal("Session restored", Severity::Info);
        self.flush(st);
        Ok(())
    }

    /// Wait until no loop task is driving batches
    ///
    /// Returns the settled state (`Idle`, `Paused`, `Ended` or `Aborted`).
    pub async fn wait_until_settled(&self) -> TrainingState {
        let handle = self.inner.task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!("Training loop task failed: {}", e);
            }
        }
        let mut rx = self.inner.state_tx.subscribe();
        let settled = rx.wait_for(|s| s.is_settled()).await.map(|s| *s);
        settled.unwrap_or_else(|_| self.training_state())
    }

    /// Subscribe to lifecycle changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<TrainingState> {
        self.inner.state_tx.subscribe()
    }

    // ------------------------------------------------------------------
    // Read accessors
    // ------------------------------------------------------------------

    /// Current lifecycle state
    #[must_use]
    pub fn training_state(&self) -> TrainingState {
        self.inner.state.lock().training_state
    }

    /// Copy of the session state
    #[must_use]
    pub fn session(&self) -> SessionState {
        self.inner.state.lock().session.clone()
    }

    /// Statistics for one question
    #[must_use]
    pub fn question_state(&self, id: &QuestionId) -> Option<QuestionTrainingState> {
        self.inner.state.lock().session.questions.get(id).cloned()
    }

    /// Current note and its version
    #[must_use]
    pub fn note(&self) -> NoteVersionStore {
        self.inner.state.lock().note.clone()
    }

    /// Current options
    #[must_use]
    pub fn options(&self) -> Options {
        self.inner.state.lock().options.clone()
    }

    /// Classification counts under the current options
    #[must_use]
    pub fn summary(&self) -> TrackerSummary {
        let st = self.inner.state.lock();
        st.session.questions.summary(&st.options)
    }

    /// Cumulative attempt and revision counts
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        self.inner.state.lock().stats
    }

    /// Most recent batches, oldest first
    #[must_use]
    pub fn recent_batches(&self) -> Vec<BatchRecord> {
        self.inner.state.lock().recent_batches.iter().cloned().collect()
    }

    /// Why the last run stopped
    #[must_use]
    pub fn end_reason(&self) -> Option<EndReason> {
        self.inner.state.lock().session.end_reason.clone()
    }

    /// Full persistable state
    #[must_use]
    pub fn snapshot(&self) -> EngineSnapshot {
        self.inner.state.lock().snapshot()
    }

    // ------------------------------------------------------------------
    // Internals shared with the scheduler
    // ------------------------------------------------------------------

    /// Move to `next` and publish it
    pub(crate) fn set_state(&self, st: &mut EngineState, next: TrainingState) {
        st.training_state = next;
        self.inner.state_tx.send_replace(next);
    }

    /// Move to `next` under a new epoch, detaching any running loop task
    fn advance(&self, st: &mut EngineState, next: TrainingState) -> u64 {
        st.epoch += 1;
        st.batch_in_flight = false;
        self.set_state(st, next);
        st.epoch
    }

    /// `Aborting -> Aborted`, recording the abort reason
    pub(crate) fn finalize_abort(&self, st: &mut EngineState) {
        let Ok(next) = transition(st.training_state, ControlEvent::FinalizeAbort) else {
            return;
        };
        let reason = st.abort_reason.take().unwrap_or_else(|| "aborted".to_string());
        st.batch_in_flight = false;
        st.session.finish(EndReason::Aborted(reason.clone()), Utc::now());
        self.set_state(st, next);
        tracing::info!(%reason, "Training aborted");
        st.signal(format!("Training aborted: {reason}"), Severity::Warning);
    }

    /// Stop the run for `reason`; a pending abort takes precedence
    pub(crate) fn terminate(&self, st: &mut EngineState, reason: EndReason) {
        if st.training_state == TrainingState::Aborting {
            self.finalize_abort(st);
            return;
        }
        let Ok(next) = transition(st.training_state, ControlEvent::Terminate) else {
            tracing::debug!("terminate ignored while {}", st.training_state);
            return;
        };
        st.batch_in_flight = false;
        st.session.finish(reason.clone(), Utc::now());
        self.set_state(st, next);
        tracing::info!(%reason, rounds = st.session.total_loop_count, "Training ended");
        let severity = if reason.is_failure() {
            Severity::Error
        } else {
            Severity::Success
        };
        st.signal(format!("Training ended: {reason}"), severity);
    }

    /// Release the guard, then emit queued signals
    pub(crate) fn flush(&self, mut st: MutexGuard<'_, EngineState>) {
        let signals = std::mem::take(&mut st.outbox);
        drop(st);
        for (message, severity) in signals {
            (self.inner.signal)(&message, severity, swot_core::DEFAULT_SIGNAL_DURATION);
        }
    }

    /// Save to the configured store, if any; failures are logged and signalled
    pub(crate) async fn autosave(&self) {
        let Some((store, key)) = self.inner.store.as_ref() else {
            return;
        };
        if let Err(e) = self.save_snapshot(store.as_ref(), key).await {
            tracing::error!(key = %key, "Automatic snapshot failed: {}", e);
            (self.inner.signal)(
                &format!("Could not save training progress: {e}"),
                Severity::Error,
                swot_core::DEFAULT_SIGNAL_DURATION,
            );
        }
    }

    fn persist_in_background(&self) {
        if self.inner.store.is_none() {
            return;
        }
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let engine = self.clone();
            runtime.spawn(async move { engine.autosave().await });
        }
    }

    fn spawn_loop(&self, runtime: &tokio::runtime::Handle, epoch: u64) {
        let engine = self.clone();
        let handle = runtime.spawn(async move { engine.run_loop(epoch).await });
        *self.inner.task.lock() = Some(handle);
    }
}
