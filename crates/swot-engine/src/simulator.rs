//! Seeded training simulator
//!
//! Runs the engine end to end against simulated oracles. Each question belongs
//! to one of a few kinds; the simulated solver gets more accurate as the note
//! collects tips for a question's kind, and the simulated critic writes those
//! tips. Same seed, same run.

use crate::engine::TrainingEngine;
use crate::error::EngineError;
use crate::record::EngineStats;
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::Arc;
use swot_core::{
    AttemptReport, CritiqueOracle, EndReason, Note, NoteEdit, NoteEditProposal, Options,
    OracleError, Persistence, QuestionEntry, SolveOracle, TrackerSummary, TrainingState,
};

/// Simulator configuration
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Number of generated questions
    pub questions: usize,
    /// Number of question kinds
    pub kinds: usize,
    /// Base probability of a correct answer
    pub accuracy: f64,
    /// Accuracy gained per tip on the question's kind
    pub tip_bonus: f64,
    /// Probability of a solver outage per attempt
    pub failure_rate: f64,
    /// Engine options
    pub options: Options,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            questions: 20,
            kinds: 3,
            accuracy: 0.6,
            tip_bonus: 0.1,
            failure_rate: 0.0,
            options: Options::default().with_batch_delay_ms(0),
        }
    }
}

impl SimulatorConfig {
    /// Generated question set
    #[must_use]
    pub fn generate_questions(&self) -> Vec<QuestionEntry> {
        let kinds = self.kinds.max(1);
        (0..self.questions)
            .map(|i| {
                let a = i + 1;
                let b = (i * 7) % 13 + 1;
                QuestionEntry::new(
                    format!("q{i:03}"),
                    serde_json::json!({ "kind": kind_id(i % kinds), "prompt": format!("{a} + {b}") }),
                    serde_json::json!(a + b),
                )
            })
            .collect()
    }
}

fn kind_id(kind: usize) -> String {
    format!("kind-{kind}")
}

fn kind_of(question: &QuestionEntry) -> &str {
    question
        .content
        .get("kind")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("general")
}

/// Solver whose accuracy grows with the tips for a question's kind
pub struct SimulatedSolveOracle {
    rng: Mutex<StdRng>,
    accuracy: f64,
    tip_bonus: f64,
    failure_rate: f64,
}

impl SimulatedSolveOracle {
    /// Create from a configuration
    #[must_use]
    pub fn new(config: &SimulatorConfig) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(config.seed)),
            accuracy: config.accuracy,
            tip_bonus: config.tip_bonus,
            failure_rate: config.failure_rate,
        }
    }
}

#[async_trait]
impl SolveOracle for SimulatedSolveOracle {
    async fn attempt(&self, question: &QuestionEntry, note: &Note) -> Result<AttemptReport, OracleError> {
        let (outage, roll) = {
            let mut rng = self.rng.lock();
            (rng.gen_bool(self.failure_rate.clamp(0.0, 1.0)), rng.gen::<f64>())
        };
        if outage {
            return Err(OracleError::Unavailable("simulated outage".to_string()));
        }

        #[allow(clippy::cast_precision_loss)]
        let tips = note
            .question_type(kind_of(question))
            .map_or(0, |qt| qt.tips.len()) as f64;
        let p = (self.accuracy + self.tip_bonus * tips).min(0.99);

        if roll < p {
            Ok(AttemptReport::correct(question.answer.to_string()))
        } else {
            Ok(AttemptReport::incorrect(format!("not {}", question.answer)))
        }
    }
}

/// Critic that adds one tip for the question's kind per wrong answer
#[derive(Debug, Default)]
pub struct SimulatedCritiqueOracle;

#[async_trait]
impl CritiqueOracle for SimulatedCritiqueOracle {
    async fn critique(
        &self,
        question: &QuestionEntry,
        wrong_answer: &str,
        note: &Note,
    ) -> Result<NoteEditProposal, OracleError> {
        let kind = kind_of(question).to_string();
        let mut edits = Vec::new();
        let existing = note.question_type(&kind).map_or(0, |qt| qt.tips.len());
        if note.question_type(&kind).is_none() {
            edits.push(NoteEdit::CreateQuestionType {
                id: kind.clone(),
                name: kind.clone(),
                description: String::new(),
            });
        }
        edits.push(NoteEdit::AppendTip {
            question_type_id: kind,
            tip: format!("tip {}: check {} before answering", existing + 1, question.id),
        });
        Ok(NoteEditProposal::new(edits).with_rationale(format!("answered {wrong_answer}")))
    }
}

/// Simulation results
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub seed: u64,
    pub questions: usize,
    pub final_state: TrainingState,
    pub end_reason: Option<EndReason>,
    pub rounds: u32,
    pub stats: EngineStats,
    pub summary: TrackerSummary,
    pub note_revision: u64,
    pub question_types: usize,
    pub tips: usize,
    pub note_markdown: String,
}

impl SimulationReport {
    /// Whether the run stopped on its own
    #[must_use]
    pub fn completed(&self) -> bool {
        self.final_state == TrainingState::Ended
            && self.end_reason.as_ref().is_some_and(|r| !r.is_failure())
    }

    /// Generate human-readable report
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut report = String::new();
        let _ = writeln!(report, "=== SWOT Simulation Report ===\n");
        let _ = writeln!(report, "Seed: {}", self.seed);
        let _ = writeln!(report, "Questions: {}", self.questions);
        let _ = writeln!(report, "Final State: {}", self.final_state);
        if let Some(reason) = &self.end_reason {
            let _ = writeln!(report, "End Reason: {reason}");
        }
        let _ = writeln!(report, "Rounds: {}", self.rounds);
        let _ = writeln!(report, "Batches: {}", self.stats.batches);
        let _ = writeln!(
            report,
            "Attempts: {} ({} correct, {} incorrect, {} failed)",
            self.stats.attempts, self.stats.correct, self.stats.incorrect, self.stats.oracle_failures
        );
        if let Some(accuracy) = self.stats.accuracy() {
            let _ = writeln!(report, "Accuracy: {:.1}%", accuracy * 100.0);
        }
        let _ = writeln!(
            report,
            "Critiques: {} ({} failed)",
            self.stats.critiques, self.stats.critique_failures
        );
        let _ = writeln!(report, "Note Revisions: {}", self.note_revision);
        let _ = writeln!(
            report,
            "Questions: {} eligible, {} simple, {} skipped, {} capped",
            self.summary.eligible, self.summary.simple, self.summary.skipped, self.summary.capped
        );

        if self.tips > 0 {
            let _ = writeln!(
                report,
                "\n=== Note ({} types, {} tips) ===",
                self.question_types, self.tips
            );
            report.push_str(&self.note_markdown);
        }

        let _ = writeln!(
            report,
            "\n=== Result: {} ===",
            if self.completed() { "COMPLETED" } else { "STOPPED" }
        );
        report
    }
}

/// Run one simulated training session to completion
///
/// # Errors
/// `EngineError` if the configuration is invalid or the runtime is missing
pub async fn run_simulation(
    config: &SimulatorConfig,
    store: Option<(Arc<dyn Persistence>, String)>,
) -> Result<SimulationReport, EngineError> {
    let mut builder = TrainingEngine::builder(
        Arc::new(SimulatedSolveOracle::new(config)),
        Arc::new(SimulatedCritiqueOracle),
    )
    .with_options(config.options.clone())
    .with_questions(config.generate_questions());
    if let Some((store, key)) = store {
        builder = builder.with_persistence(store, key);
    }
    let engine = builder.build()?;

    tracing::info!(seed = config.seed, questions = config.questions, "Simulation started");
    if !engine.start() {
        return Err(EngineError::Busy(engine.training_state()));
    }
    let final_state = engine.wait_until_settled().await;

    let session = engine.session();
    let store = engine.note();
    let note = store.note();
    Ok(SimulationReport {
        seed: config.seed,
        questions: config.questions,
        final_state,
        end_reason: session.end_reason.clone(),
        rounds: session.total_loop_count,
        stats: engine.stats(),
        summary: engine.summary(),
        note_revision: store.revision(),
        question_types: note.question_types.len(),
        tips: note.tip_count(),
        note_markdown: note.to_markdown(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_questions_are_unique() {
        let config = SimulatorConfig {
            questions: 30,
            ..SimulatorConfig::default()
        };
        let questions = config.generate_questions();
        let registry = swot_core::QuestionRegistry::from_entries(questions).unwrap();
        assert_eq!(registry.len(), 30);
    }

    #[tokio::test]
    async fn critic_creates_type_then_appends() {
        let question = SimulatorConfig::default().generate_questions().remove(0);
        let critic = SimulatedCritiqueOracle;

        let proposal = critic.critique(&question, "3", &Note::default()).await.unwrap();
        assert_eq!(proposal.edits.len(), 2);

        let mut note = Note::default();
        for edit in &proposal.edits {
            note.apply(edit).unwrap();
        }
        let proposal = critic.critique(&question, "3", &note).await.unwrap();
        assert_eq!(proposal.edits.len(), 1);
        assert!(matches!(proposal.edits[0], NoteEdit::AppendTip { .. }));
    }

    #[tokio::test]
    async fn certain_solver_is_always_correct() {
        let config = SimulatorConfig {
            accuracy: 1.0,
            ..SimulatorConfig::default()
        };
        let solver = SimulatedSolveOracle::new(&config);
        let question = config.generate_questions().remove(0);
        for _ in 0..10 {
            let report = solver.attempt(&question, &Note::default()).await.unwrap();
            assert_eq!(report.outcome, swot_core::AttemptOutcome::Correct);
        }
    }

    #[tokio::test]
    async fn simulation_is_deterministic() {
        let config = SimulatorConfig {
            questions: 8,
            ..SimulatorConfig::default()
        };
        let first = run_simulation(&config, None).await.unwrap();
        let second = run_simulation(&config, None).await.unwrap();

        assert_eq!(first.stats, second.stats);
        assert_eq!(first.end_reason, second.end_reason);
        assert_eq!(first.tips, second.tips);
        assert!(first.final_state.is_terminal());
        assert!(first.generate_text().contains("=== SWOT Simulation Report ==="));
    }

    #[tokio::test]
    async fn total_outage_ends_the_run() {
        let config = SimulatorConfig {
            questions: 4,
            failure_rate: 1.0,
            ..SimulatorConfig::default()
        };
        let report = run_simulation(&config, None).await.unwrap();
        assert_eq!(report.end_reason, Some(EndReason::AllAttemptsFailed));
        assert!(!report.completed());
        assert_eq!(report.stats.attempts, config.options.batch_size.min(4) as u64);
    }
}
