//! Batch scheduler
//!
//! The training loop spawned by `start()` and `resume()`:
//! 1. At every batch boundary, honor a pending pause or abort
//! 2. At a round start, check termination (loop budget, certification,
//!    eligibility) and partition eligible questions into a round plan
//! 3. Fan out one solve attempt per question in the batch, against one note
//!    version
//! 4. Commit outcomes, then critique each wrong answer in turn, merging
//!    proposals into the note
//!
//! The loop holds an epoch; once `reset()` or another run bumps it, the old
//! task discards whatever it was doing and exits without touching state.

use crate::engine::{EngineState, TrainingEngine};
use crate::record::BatchRecord;
use chrono::Utc;
use std::time::{Duration, Instant};
use swot_core::state_machine::transition;
use swot_core::{
    AttemptOutcome, AttemptReport, ControlEvent, EndReason, Note, QuestionEntry, QuestionId,
    RoundPlan, RunId, Severity, TrainingState, VersionTag,
};

/// What the loop does next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    /// Keep going
    Continue,
    /// The run paused or stopped; persist and exit
    Halt,
    /// Another task owns the session now; exit silently
    Stale,
}

/// One batch ready to execute
struct BatchWork {
    run_id: RunId,
    round: u32,
    index: usize,
    entries: Vec<QuestionEntry>,
    note: Note,
    version: VersionTag,
}

enum Step {
    Run(BatchWork),
    Stop(Flow),
}

/// Wrong answer awaiting critique
struct Miss {
    question: QuestionEntry,
    answer: String,
}

impl TrainingEngine {
    /// Drive batches until the run pauses, stops or goes stale
    pub(crate) async fn run_loop(&self, epoch: u64) {
        tracing::debug!(epoch, "Training loop started");
        let flow = loop {
            let work = match self.next_batch(epoch) {
                Step::Run(work) => work,
                Step::Stop(flow) => break flow,
            };
            match self.run_batch(epoch, work).await {
                Flow::Continue => self.pause_between_batches().await,
                flow => break flow,
            }
        };

        if flow == Flow::Halt {
            self.autosave_halted(epoch).await;
        }
        tracing::debug!(epoch, ?flow, "Training loop exited");
    }

    /// Persist a halted run unless a newer loop already owns the session
    async fn autosave_halted(&self, epoch: u64) {
        let current = self.inner.state.lock().epoch == epoch;
        if !current {
            tracing::debug!(epoch, "Superseded loop skips autosave");
            return;
        }
        self.autosave().await;
    }

    /// Boundary checks, round bookkeeping and batch selection
    fn next_batch(&self, epoch: u64) -> Step {
        let mut st = self.inner.state.lock();
        let step = self.select_batch(&mut st, epoch);
        if matches!(step, Step::Run(_)) {
            st.batch_in_flight = true;
        }
        self.flush(st);
        step
    }

    fn select_batch(&self, st: &mut EngineState, epoch: u64) -> Step {
        if st.epoch != epoch {
            return Step::Stop(Flow::Stale);
        }
        if let Some(flow) = self.at_boundary(st) {
            return Step::Stop(flow);
        }

        loop {
            if st.session.round_plan.is_none() {
                if let Some(reason) = termination_reason(st) {
                    self.terminate(st, reason);
                    return Step::Stop(Flow::Halt);
                }
                let eligible = st.session.questions.eligible_ids(&st.options);
                let plan = RoundPlan::partition(&eligible, st.options.batch_size);
                tracing::debug!(
                    round = st.session.total_loop_count,
                    questions = eligible.len(),
                    batches = plan.len(),
                    "Round planned"
                );
                st.session.round_plan = Some(plan);
                st.session.last_batch_index = 0;
            }

            let index = st.session.last_batch_index;
            let batch = st
                .session
                .round_plan
                .as_ref()
                .and_then(|plan| plan.batch(index))
                .map(<[QuestionId]>::to_vec);

            let Some(ids) = batch else {
                st.session.total_loop_count += 1;
                st.session.round_plan = None;
                st.session.last_batch_index = 0;
                tracing::debug!(completed = st.session.total_loop_count, "Round complete");
                continue;
            };

            let entries: Vec<QuestionEntry> = ids
                .iter()
                .filter_map(|id| {
                    let entry = st.registry.get(id).cloned();
                    if entry.is_none() {
                        tracing::warn!(question = %id, "Planned question is no longer registered");
                    }
                    entry
                })
                .collect();

            if entries.is_empty() {
                st.session.last_batch_index = index + 1;
                continue;
            }

            let run_id = *st.run_id.get_or_insert_with(RunId::new);
            return Step::Run(BatchWork {
                run_id,
                round: st.session.total_loop_count,
                index,
                entries,
                note: st.note.note().clone(),
                version: st.note.version().clone(),
            });
        }
    }

    /// Honor a pending pause or abort; `None` while running
    fn at_boundary(&self, st: &mut EngineState) -> Option<Flow> {
        match st.training_state {
            TrainingState::Running => None,
            TrainingState::PreparingPause => {
                if let Ok(next) = transition(st.training_state, ControlEvent::ReachPauseBoundary) {
                    self.set_state(st, next);
                }
                st.batch_in_flight = false;
                tracing::info!(batch = st.session.last_batch_index, "Training paused");
                st.signal("Training paused", Severity::Info);
                Some(Flow::Halt)
            }
            TrainingState::Aborting => {
                self.finalize_abort(st);
                Some(Flow::Halt)
            }
            _ => Some(Flow::Stale),
        }
    }

    /// Execute one batch through commit and critique
    async fn run_batch(&self, epoch: u64, work: BatchWork) -> Flow {
        let started = Instant::now();
        tracing::debug!(
            round = work.round,
            batch = work.index,
            size = work.entries.len(),
            version = %work.version,
            "Batch started"
        );

        let solver = &self.inner.solver;
        let results = futures::future::join_all(
            work.entries
                .iter()
                .map(|question| solver.attempt(question, &work.note)),
        )
        .await;

        let reports: Vec<AttemptReport> = work
            .entries
            .iter()
            .zip(results)
            .map(|(question, result)| {
                if let Err(e) = &result {
                    tracing::warn!(question = %question.id, "Solve oracle failed: {}", e);
                }
                AttemptReport::from(result)
            })
            .collect();

        let misses = match self.commit_attempts(epoch, &work, &reports) {
            Ok(misses) => misses,
            Err(flow) => return flow,
        };

        let mut revisions = 0;
        for miss in misses {
            let Some(note) = self.current_note(epoch) else {
                return Flow::Stale;
            };
            let result = self
                .inner
                .critic
                .critique(&miss.question, &miss.answer, &note)
                .await;
            match self.apply_critique(epoch, &miss.question.id, result) {
                Some(changed) => revisions += usize::from(changed),
                None => return Flow::Stale,
            }
        }

        metrics::histogram!("swot_batch_duration_seconds").record(started.elapsed().as_secs_f64());
        self.finish_batch(epoch, work, &reports, revisions)
    }

    /// Record outcomes; returns the wrong answers to critique
    fn commit_attempts(
        &self,
        epoch: u64,
        work: &BatchWork,
        reports: &[AttemptReport],
    ) -> Result<Vec<Miss>, Flow> {
        let mut st = self.inner.state.lock();
        if st.epoch != epoch {
            return Err(Flow::Stale);
        }

        let mut misses = Vec::new();
        for (question, report) in work.entries.iter().zip(reports) {
            let EngineState { session, options, stats, .. } = &mut *st;
            match report.outcome {
                AttemptOutcome::Correct => session.questions.record_correct(&question.id, options),
                AttemptOutcome::Incorrect => {
                    session.questions.record_error(&question.id, options);
                    misses.push(Miss {
                        question: question.clone(),
                        answer: report.raw_response.clone(),
                    });
                }
                AttemptOutcome::OracleFailure => {}
            }
            stats.record_attempt(report.outcome);
        }

        let all_failed = reports.iter().all(|r| r.outcome == AttemptOutcome::OracleFailure);
        if all_failed {
            let record = batch_record(work, reports, 0);
            st.push_batch(record);
            tracing::warn!(batch = work.index, "Every attempt in the batch failed");
            self.terminate(&mut st, EndReason::AllAttemptsFailed);
            self.flush(st);
            return Err(Flow::Halt);
        }

        if misses.is_empty() {
            st.session.version_certify_count += 1;
            tracing::debug!(
                certified = st.session.version_certify_count,
                version = %work.version,
                "Batch fully correct"
            );
        }
        self.flush(st);
        Ok(misses)
    }

    /// Note to show the critic, or `None` once the loop is stale
    fn current_note(&self, epoch: u64) -> Option<Note> {
        let st = self.inner.state.lock();
        (st.epoch == epoch).then(|| st.note.note().clone())
    }

    /// Merge a critique result; returns whether the note version changed
    fn apply_critique(
        &self,
        epoch: u64,
        question: &QuestionId,
        result: Result<swot_core::NoteEditProposal, swot_core::OracleError>,
    ) -> Option<bool> {
        let mut st = self.inner.state.lock();
        if st.epoch != epoch {
            return None;
        }
        st.stats.critiques += 1;

        let changed = match result {
            Ok(proposal) => {
                let outcome = st.note.merge(&proposal);
                if outcome.version_changed {
                    st.session.begin_version();
                    st.stats.revisions += 1;
                    metrics::counter!("swot_note_revisions_total").increment(1);
                    let version = st.note.version().clone();
                    tracing::info!(
                        %question,
                        %version,
                        applied = outcome.applied,
                        rejected = outcome.rejected.len(),
                        "Note revised"
                    );
                    st.signal(format!("Note revised after {question}"), Severity::Info);
                }
                outcome.version_changed
            }
            Err(e) => {
                st.stats.critique_failures += 1;
                tracing::warn!(%question, "Critique oracle failed: {}", e);
                st.signal(format!("Critique failed for {question}: {e}"), Severity::Warning);
                false
            }
        };
        self.flush(st);
        Some(changed)
    }

    /// Advance past the batch and honor an abort requested mid-batch
    fn finish_batch(&self, epoch: u64, work: BatchWork, reports: &[AttemptReport], revisions: usize) -> Flow {
        let mut st = self.inner.state.lock();
        if st.epoch != epoch {
            return Flow::Stale;
        }
        st.batch_in_flight = false;
        st.session.last_batch_index = work.index + 1;
        st.push_batch(batch_record(&work, reports, revisions));
        metrics::counter!("swot_batches_total").increment(1);
        tracing::debug!(round = work.round, batch = work.index, revisions, "Batch committed");

        let flow = if st.training_state == TrainingState::Aborting {
            self.finalize_abort(&mut st);
            Flow::Halt
        } else {
            Flow::Continue
        };
        self.flush(st);
        flow
    }

    /// Inter-batch delay; cut short by any lifecycle change
    async fn pause_between_batches(&self) {
        let delay = {
            let st = self.inner.state.lock();
            if st.training_state != TrainingState::Running {
                return;
            }
            st.options.batch_delay_ms
        };
        if delay == 0 {
            tokio::task::yield_now().await;
            return;
        }

        let mut rx = self.inner.state_tx.subscribe();
        tokio::select! {
            () = tokio::time::sleep(Duration::from_millis(delay)) => {}
            _ = rx.wait_for(|s| *s != TrainingState::Running) => {}
        }
    }
}

/// First termination condition that holds at a round start
fn termination_reason(st: &EngineState) -> Option<EndReason> {
    if st.session.total_loop_count >= st.options.max_loop_count {
        return Some(EndReason::LoopBudgetExhausted);
    }
    if st.session.version_certify_count >= st.options.max_certify_count {
        return Some(EndReason::NoteCertified);
    }
    if st.session.questions.eligible_ids(&st.options).is_empty() {
        return Some(EndReason::NoEligibleQuestions);
    }
    None
}

fn batch_record(work: &BatchWork, reports: &[AttemptReport], revisions: usize) -> BatchRecord {
    BatchRecord {
        run_id: work.run_id,
        round: work.round,
        batch_index: work.index,
        version: work.version.clone(),
        attempts: work
            .entries
            .iter()
            .zip(reports)
            .map(|(q, r)| (q.id.clone(), r.outcome))
            .collect(),
        revisions,
        finished_at: Utc::now(),
    }
}
