//! Per-step state machine
//!
//! Every local step and every remote dispatch moves through
//! `Pending -> Running -> {Success, Skipped, Failed, Unknown}`. Terminal states
//! are final; re-running a step is an operator decision, never automatic.

use crate::core::error::ReleaseError;
use crate::core::model::{Step, StepOutcome, Target};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Step state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepState {
    Pending,
    Running,
    Success,
    Skipped,
    Failed,
    Unknown,
}

impl StepState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StepState::Pending | StepState::Running)
    }

    /// Outcome for a terminal state
    pub fn outcome(&self) -> Option<StepOutcome> {
        match self {
            StepState::Success => Some(StepOutcome::Success),
            StepState::Skipped => Some(StepOutcome::Skipped),
            StepState::Failed => Some(StepOutcome::Failed),
            StepState::Unknown => Some(StepOutcome::Unknown),
            StepState::Pending | StepState::Running => None,
        }
    }
}

impl From<StepOutcome> for StepState {
    fn from(outcome: StepOutcome) -> Self {
        match outcome {
            StepOutcome::Success => StepState::Success,
            StepOutcome::Skipped => StepState::Skipped,
            StepOutcome::Failed => StepState::Failed,
            StepOutcome::Unknown => StepState::Unknown,
        }
    }
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// State transition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateTransition {
    pub from: StepState,
    pub to: StepState,
    pub timestamp: DateTime<Utc>,
}

/// Tracks one step (or one dispatch when `step` is `None`) of one target
#[derive(Debug, Clone)]
pub struct StepTracker {
    target: Target,
    step: Option<Step>,
    state: StepState,
    transitions: Vec<StateTransition>,
}

impl StepTracker {
    pub fn new(target: Target, step: Option<Step>) -> Self {
        Self {
            target,
            step,
            state: StepState::Pending,
            transitions: Vec::new(),
        }
    }

    pub fn state(&self) -> StepState {
        self.state
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn step(&self) -> Option<Step> {
        self.step
    }

    /// Move to `to`, rejecting anything but `Pending -> Running -> terminal`
    pub fn transition(&mut self, to: StepState) -> Result<(), ReleaseError> {
        let allowed = match self.state {
            StepState::Pending => to == StepState::Running,
            StepState::Running => to.is_terminal(),
            _ => false,
        };

        if !allowed {
            return Err(ReleaseError::InvalidTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }

        tracing::trace!(
            target_name = %self.target,
            step = ?self.step,
            from = %self.state,
            to = %to,
            "step transition"
        );

        self.transitions.push(StateTransition {
            from: self.state,
            to,
            timestamp: Utc::now(),
        });
        self.state = to;

        Ok(())
    }

    pub fn start(&mut self) -> Result<(), ReleaseError> {
        self.transition(StepState::Running)
    }

    pub fn finish(&mut self, outcome: StepOutcome) -> Result<(), ReleaseError> {
        self.transition(outcome.into())
    }

    /// Milliseconds between the first and last transition
    pub fn elapsed_ms(&self) -> u64 {
        match (self.transitions.first(), self.transitions.last()) {
            (Some(first), Some(last)) => {
                (last.timestamp - first.timestamp).num_milliseconds().max(0) as u64
            }
            _ => 0,
        }
    }

    /// Transition history as human-readable lines
    pub fn history(&self) -> String {
        self.transitions
            .iter()
            .map(|t| format!("{}: {} → {}", t.timestamp.to_rfc3339(), t.from, t.to))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_tracker_is_pending() {
        let tracker = StepTracker::new(Target::Index, Some(Step::Build));

        assert_eq!(tracker.state(), StepState::Pending);
        assert!(!tracker.state().is_terminal());
        assert_eq!(tracker.elapsed_ms(), 0);
    }

    #[test]
    fn test_happy_path() {
        let mut tracker = StepTracker::new(Target::Apt, Some(Step::Commit));

        tracker.start().unwrap();
        tracker.finish(StepOutcome::Skipped).unwrap();

        assert_eq!(tracker.state(), StepState::Skipped);
        assert_eq!(tracker.state().outcome(), Some(StepOutcome::Skipped));
        let history = tracker.history();
        assert!(history.contains("Pending → Running"));
        assert!(history.contains("Running → Skipped"));
    }

    #[test]
    fn test_terminal_states_are_final() {
        for outcome in [
            StepOutcome::Success,
            StepOutcome::Skipped,
            StepOutcome::Failed,
            StepOutcome::Unknown,
        ] {
            let mut tracker = StepTracker::new(Target::Brew, None);
            tracker.start().unwrap();
            tracker.finish(outcome).unwrap();

            assert!(tracker.start().is_err());
            assert!(tracker.finish(StepOutcome::Success).is_err());
            assert_eq!(tracker.state(), StepState::from(outcome));
        }
    }

    #[test]
    fn test_cannot_finish_without_running() {
        let mut tracker = StepTracker::new(Target::VcsRelease, Some(Step::Verify));

        let err = tracker.finish(StepOutcome::Success).unwrap_err();
        assert_eq!(err.code(), "INVALID_TRANSITION");
        assert_eq!(tracker.state(), StepState::Pending);
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_string(&StepState::Unknown).unwrap();
        assert_eq!(json, r#""UNKNOWN""#);
    }
}
