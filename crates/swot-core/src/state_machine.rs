//! Training lifecycle state machine
//!
//! ```text
//! Idle|Ended|Aborted --start--> Running --requestPause--> PreparingPause
//! PreparingPause --boundary--> Paused --resume--> Running
//! PreparingPause --cancelPause--> Running
//! Running|PreparingPause|Paused --requestAbort--> Aborting --finalize--> Aborted
//! Running|PreparingPause --terminate--> Ended
//! Idle|Paused|Ended|Aborted --reset--> Idle
//! ```
//!
//! Control methods report an illegal transition as "not accepted" rather than
//! failing, so callers can invoke them without pre-checking state.

use crate::error::StateMachineError;
use serde::{Deserialize, Serialize};

/// Lifecycle state of the training engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingState {
    /// Nothing has run yet, or the session was reset
    #[default]
    Idle,
    /// The loop is executing batches
    Running,
    /// A pause was requested; the in-flight batch is finishing
    PreparingPause,
    /// Stopped at a batch boundary; resumable
    Paused,
    /// An abort was requested; the in-flight batch is finishing
    Aborting,
    /// Stopped by request
    Aborted,
    /// Stopped by a termination condition
    Ended,
}

impl TrainingState {
    /// Whether a loop task may be driving batches in this state
    #[inline]
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::PreparingPause | Self::Aborting)
    }

    /// Whether the state is final for the current run
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Aborted | Self::Ended)
    }

    /// Whether no loop task is running and nothing is pending
    #[inline]
    #[must_use]
    pub fn is_settled(self) -> bool {
        !self.is_active()
    }
}

impl std::fmt::Display for TrainingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::PreparingPause => "preparing_pause",
            Self::Paused => "paused",
            Self::Aborting => "aborting",
            Self::Aborted => "aborted",
            Self::Ended => "ended",
        };
        f.write_str(s)
    }
}

/// Events driving the lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlEvent {
    /// Caller starts a new run
    Start,
    /// Caller asks to pause at the next boundary
    RequestPause,
    /// Loop reached a batch boundary with a pause pending
    ReachPauseBoundary,
    /// Caller withdraws a pending pause
    CancelPauseRequest,
    /// Caller continues a paused run
    Resume,
    /// Caller asks to abort
    RequestAbort,
    /// Abort finalized (boundary reached or nothing in flight)
    FinalizeAbort,
    /// A termination condition fired
    Terminate,
    /// Caller clears the session
    Reset,
}

/// Target state for `event` from `from`, if legal
#[must_use]
pub fn next_state(from: TrainingState, event: ControlEvent) -> Option<TrainingState> {
    use ControlEvent as E;
    use TrainingState as S;
    match (from, event) {
        (S::Idle | S::Ended | S::Aborted, E::Start) => Some(S::Running),
        (S::Running, E::RequestPause) => Some(S::PreparingPause),
        (S::PreparingPause, E::ReachPauseBoundary) => Some(S::Paused),
        (S::PreparingPause, E::CancelPauseRequest) => Some(S::Running),
        (S::Paused, E::Resume) => Some(S::Running),
        (S::Running | S::Paused | S::PreparingPause, E::RequestAbort) => Some(S::Aborting),
        (S::Aborting, E::FinalizeAbort) => Some(S::Aborted),
        // A pending pause is moot once a termination condition fires.
        (S::Running | S::PreparingPause, E::Terminate) => Some(S::Ended),
        (S::Idle | S::Paused | S::Ended | S::Aborted, E::Reset) => Some(S::Idle),
        _ => None,
    }
}

/// Validate a transition
///
/// # Errors
/// `StateMachineError::IllegalTransition` if `event` is not permitted from `from`
pub fn transition(from: TrainingState, event: ControlEvent) -> Result<TrainingState, StateMachineError> {
    next_state(from, event).ok_or(StateMachineError::IllegalTransition { from, event })
}

/// Events accepted from a state
#[must_use]
pub fn allowed_events(from: TrainingState) -> Vec<ControlEvent> {
    ALL_EVENTS
        .iter()
        .copied()
        .filter(|event| next_state(from, *event).is_some())
        .collect()
}

/// Every lifecycle state
pub const ALL_STATES: [TrainingState; 7] = [
    TrainingState::Idle,
    TrainingState::Running,
    TrainingState::PreparingPause,
    TrainingState::Paused,
    TrainingState::Aborting,
    TrainingState::Aborted,
    TrainingState::Ended,
];

/// Every control event
pub const ALL_EVENTS: [ControlEvent; 9] = [
    ControlEvent::Start,
    ControlEvent::RequestPause,
    ControlEvent::ReachPauseBoundary,
    ControlEvent::CancelPauseRequest,
    ControlEvent::Resume,
    ControlEvent::RequestAbort,
    ControlEvent::FinalizeAbort,
    ControlEvent::Terminate,
    ControlEvent::Reset,
];

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn start_transitions() {
        assert_eq!(transition(TrainingState::Idle, ControlEvent::Start), Ok(TrainingState::Running));
        assert_eq!(transition(TrainingState::Ended, ControlEvent::Start), Ok(TrainingState::Running));
        assert_eq!(transition(TrainingState::Aborted, ControlEvent::Start), Ok(TrainingState::Running));
        assert!(transition(TrainingState::Running, ControlEvent::Start).is_err());
        assert!(transition(TrainingState::Paused, ControlEvent::Start).is_err());
    }

    #[test]
    fn pause_transitions() {
        assert!(transition(TrainingState::Idle, ControlEvent::RequestPause).is_err());
        assert_eq!(
            transition(TrainingState::Running, ControlEvent::RequestPause),
            Ok(TrainingState::PreparingPause)
        );
        assert_eq!(
            transition(TrainingState::PreparingPause, ControlEvent::CancelPauseRequest),
            Ok(TrainingState::Running)
        );
        assert!(transition(TrainingState::Paused, ControlEvent::CancelPauseRequest).is_err());
        assert!(transition(TrainingState::PreparingPause, ControlEvent::Resume).is_err());
        assert_eq!(transition(TrainingState::Paused, ControlEvent::Resume), Ok(TrainingState::Running));
    }

    #[test]
    fn abort_transitions() {
        for from in [TrainingState::Running, TrainingState::Paused, TrainingState::PreparingPause] {
            assert_eq!(transition(from, ControlEvent::RequestAbort), Ok(TrainingState::Aborting));
        }
        assert!(transition(TrainingState::Idle, ControlEvent::RequestAbort).is_err());
        assert!(transition(TrainingState::Ended, ControlEvent::RequestAbort).is_err());
        assert_eq!(
            transition(TrainingState::Aborting, ControlEvent::FinalizeAbort),
            Ok(TrainingState::Aborted)
        );
    }

    #[test]
    fn terminate_only_while_driving_batches() {
        assert_eq!(transition(TrainingState::Running, ControlEvent::Terminate), Ok(TrainingState::Ended));
        assert_eq!(
            transition(TrainingState::PreparingPause, ControlEvent::Terminate),
            Ok(TrainingState::Ended)
        );
        assert!(transition(TrainingState::Paused, ControlEvent::Terminate).is_err());
        assert!(transition(TrainingState::Aborting, ControlEvent::Terminate).is_err());
    }

    #[test]
    fn reset_requires_settled_state() {
        assert!(transition(TrainingState::Running, ControlEvent::Reset).is_err());
        assert!(transition(TrainingState::Aborting, ControlEvent::Reset).is_err());
        assert_eq!(transition(TrainingState::Paused, ControlEvent::Reset), Ok(TrainingState::Idle));
    }

    #[test]
    fn allowed_events_from_idle() {
        assert_eq!(
            allowed_events(TrainingState::Idle),
            vec![ControlEvent::Start, ControlEvent::Reset]
        );
    }

    fn any_state() -> impl Strategy<Value = TrainingState> {
        proptest::sample::select(ALL_STATES.to_vec())
    }

    fn any_event() -> impl Strategy<Value = ControlEvent> {
        proptest::sample::select(ALL_EVENTS.to_vec())
    }

    proptest! {
        #[test]
        fn prop_transition_matches_allowed_events(from in any_state(), event in any_event()) {
            let res = transition(from, event);
            let allowed = allowed_events(from);
            prop_assert_eq!(res.is_ok(), allowed.contains(&event));
        }

        #[test]
        fn prop_terminal_states_only_restart_or_reset(from in any_state(), event in any_event()) {
            if from.is_terminal() {
                if let Ok(to) = transition(from, event) {
                    prop_assert!(matches!(to, TrainingState::Running | TrainingState::Idle));
                }
            }
        }
    }
}
