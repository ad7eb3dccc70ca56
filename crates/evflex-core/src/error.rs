//! Errors raised by the data model.
//!
//! [`EvError`] covers malformed events and agents, inconsistent horizons and
//! bad configuration values. Solver-side failures live in
//! `evflex_algo::ScheduleError`, which converts into `EvError::Solver` at
//! API boundaries.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvError {
    /// Event windows, agent capacities, segment boundaries, load lengths
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown horizon code, invalid time grid
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Solver error: {0}")]
    Solver(String),
}

pub type EvResult<T> = Result<T, EvError>;
