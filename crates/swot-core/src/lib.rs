//! SWOT Core - training model and contracts
//!
//! The building blocks of the training engine:
//! - Question registry and per-question statistics
//! - Note document, typed edits and version store
//! - Options, session state and snapshots
//! - The training lifecycle state machine
//! - Oracle, persistence and signal contracts
//!
//! # Example
//!
//! ```rust
//! use swot_core::{Options, QuestionId, QuestionStateTracker};
//!
//! let options = Options::default().with_simple_thresholds(2, 4);
//! let id = QuestionId::from("q1");
//! let mut tracker = QuestionStateTracker::for_questions([&id]);
//!
//! tracker.record_correct(&id, &options);
//! tracker.record_correct(&id, &options);
//! assert!(!tracker.is_eligible(&id, &options));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod error;
pub mod note;
pub mod options;
pub mod oracle;
pub mod persistence;
pub mod registry;
pub mod session;
pub mod signal;
pub mod snapshot;
pub mod state_machine;
pub mod tracker;
pub mod types;

// Re-exports for convenience
pub use error::{
    NoteEditError, OptionsError, OracleError, PersistenceError, RegistryError, SnapshotError,
    StateMachineError,
};
pub use note::{MergeOutcome, Note, NoteEdit, NoteEditProposal, NoteVersionStore, QuestionType, VersionTag};
pub use options::{Options, OptionsPatch};
pub use oracle::{AttemptOutcome, AttemptReport, CritiqueOracle, SolveOracle};
pub use persistence::Persistence;
pub use registry::QuestionRegistry;
pub use session::{RoundPlan, SessionState};
pub use signal::{tracing_signal, SignalFn, DEFAULT_SIGNAL_DURATION};
pub use snapshot::{EngineSnapshot, SNAPSHOT_FORMAT};
pub use state_machine::{ControlEvent, TrainingState};
pub use tracker::{QuestionStateTracker, QuestionTrainingState, TrackerSummary};
pub use types::{EndReason, QuestionEntry, QuestionId, RunId, Severity};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with SWOT Core
    pub use crate::{
        AttemptOutcome, AttemptReport, CritiqueOracle, EndReason, Note, NoteEdit,
        NoteEditProposal, Options, OptionsPatch, OracleError, Persistence, QuestionEntry,
        QuestionId, Severity, SolveOracle, TrainingState,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
