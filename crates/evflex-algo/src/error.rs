use evflex_core::{AgentId, EvError};
use thiserror::Error;

/// Errors raised while building or solving charging programs.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// The solver terminated without a usable solution for one unit of work.
    /// Fatal: the run stops and nothing is persisted for this unit.
    #[error("Solve failed for agent {agent}, segment {segment}: solver status {status}")]
    SolveFailed {
        agent: AgentId,
        segment: usize,
        status: String,
    },

    /// The simultaneous all-agents program did not solve.
    #[error("Joint solve failed: solver status {status}")]
    JointSolveFailed { status: String },

    /// Solver setup failed before any iteration (bad settings, malformed matrices).
    #[error("Solver error: {0}")]
    Solver(String),

    /// Inputs inconsistent with the residual load or horizon.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<ScheduleError> for EvError {
    fn from(err: ScheduleError) -> Self {
        match err {
            ScheduleError::InvalidInput(msg) => EvError::Validation(msg),
            other => EvError::Solver(other.to_string()),
        }
    }
}
