//! Quadratic-program model and solver adapters.

mod backend;
mod model;

pub use backend::{
    classify_clarabel_status, ClarabelBackend, SolveOutcome, SolveStatus, SolverAdapter,
    SolverConfig,
};
pub use model::{LinearRow, QpModel, VarId};
