//! Session snapshots
//!
//! Everything needed to continue a session in another process: options,
//! session state, the note with its version tag, and the lifecycle state.
//! The only contract of the JSON form is round-trip fidelity.

use crate::error::SnapshotError;
use crate::note::NoteVersionStore;
use crate::options::Options;
use crate::session::SessionState;
use crate::state_machine::TrainingState;
use serde::{Deserialize, Serialize};

/// Format marker written into every snapshot
pub const SNAPSHOT_FORMAT: u32 = 1;

/// Persistable engine state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSnapshot {
    /// Format marker
    #[serde(default = "default_format")]
    pub format: u32,
    /// Lifecycle state at capture time
    pub training_state: TrainingState,
    /// Training options
    pub options: Options,
    /// Session counters and question statistics
    pub session: SessionState,
    /// Note and version tag
    pub note: NoteVersionStore,
}

fn default_format() -> u32 {
    SNAPSHOT_FORMAT
}

impl EngineSnapshot {
    /// Serialize to JSON
    ///
    /// # Errors
    /// `SnapshotError::Serde` if encoding fails
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON and validate options
    ///
    /// # Errors
    /// - `SnapshotError::Serde` for malformed input
    /// - `SnapshotError::InvalidOptions` if the stored options do not validate
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let snapshot: Self = serde_json::from_str(json)?;
        snapshot.options.validate()?;
        Ok(snapshot)
    }

    /// Lifecycle state to restore into
    ///
    /// No loop task survives a restart, so a snapshot captured mid-run comes
    /// back as `Paused` and resumes at `last_batch_index`.
    #[must_use]
    pub fn restored_state(&self) -> TrainingState {
        if self.training_state.is_active() {
            TrainingState::Paused
        } else {
            self.training_state
        }
    }
}
