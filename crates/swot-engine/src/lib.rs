//! SWOT Engine - resumable batch training with note revision
//!
//! Drives a solve oracle over a question set in batches, critiques every
//! wrong answer and merges the proposed edits into a versioned note:
//! - Pause, resume and abort at batch boundaries
//! - Per-question simple/skip classification
//! - Snapshots to any [`swot_core::Persistence`] backend
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use swot_engine::simulator::{SimulatedCritiqueOracle, SimulatedSolveOracle, SimulatorConfig};
//! use swot_engine::TrainingEngine;
//!
//! # async fn run() -> Result<(), swot_engine::EngineError> {
//! let config = SimulatorConfig::default();
//! let engine = TrainingEngine::builder(
//!     Arc::new(SimulatedSolveOracle::new(&config)),
//!     Arc::new(SimulatedCritiqueOracle),
//! )
//! .with_questions(config.generate_questions())
//! .build()?;
//!
//! engine.start();
//! let state = engine.wait_until_settled().await;
//! println!("stopped: {state}");
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod engine;
pub mod error;
pub mod record;
mod scheduler;
pub mod simulator;
pub mod store;

pub use engine::{EngineBuilder, TrainingEngine};
pub use error::EngineError;
pub use record::{BatchRecord, EngineStats, RECENT_BATCH_CAPACITY};
pub use simulator::{run_simulation, SimulationReport, SimulatorConfig};
pub use store::{JsonFileStore, MemoryStore};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving the engine
    pub use crate::{EngineError, JsonFileStore, MemoryStore, TrainingEngine};
    pub use swot_core::prelude::*;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
