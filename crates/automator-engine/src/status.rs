//! Observable run status

use automator_core::RunId;
use serde::{Deserialize, Serialize};

/// Where the engine is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    /// No run has been started
    #[default]
    Idle,
    /// Steps are executing
    Running,
    /// Between iterations: running the callback or the iteration delay
    Iterating,
    /// All iterations finished and the completion handle resolved
    Done,
    /// Stopped by the kill latch
    Killed,
    /// Stopped by a handler or configuration fault
    Faulted,
}

impl RunPhase {
    /// Whether a run is still in progress
    pub fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::Iterating)
    }
}

/// Snapshot of the current run's bookkeeping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RunStatus {
    /// Run this snapshot belongs to
    pub run_id: Option<RunId>,
    /// Lifecycle phase
    pub phase: RunPhase,
    /// Cursor into the main sequence
    pub action_index: usize,
    /// Number of actions in the main sequence after expansion
    pub action_count: usize,
    /// Iterations finished so far
    pub iteration_index: usize,
    /// Iterations requested
    pub num_iterations: usize,
    /// Number of interim sequences waiting on the stack
    pub interim_depth: usize,
    /// Kill latch
    pub killed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_idle() {
        let status = RunStatus::default();
        assert_eq!(status.phase, RunPhase::Idle);
        assert!(status.run_id.is_none());
        assert!(!status.phase.is_active());
    }

    #[test]
    fn test_active_phases() {
        assert!(RunPhase::Running.is_active());
        assert!(RunPhase::Iterating.is_active());
        assert!(!RunPhase::Done.is_active());
        assert!(!RunPhase::Killed.is_active());
        assert!(!RunPhase::Faulted.is_active());
    }
}
