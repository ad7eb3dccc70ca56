//! Solver adapters for [`QpModel`].
//!
//! Backends report a three-way [`SolveStatus`] so the scheduler's error
//! handling does not depend on any solver's own status codes. The raw status
//! is kept as a string for diagnostics.

use crate::qp::model::{QpModel, VarId};
use crate::ScheduleError;
use clarabel::{
    algebra::CscMatrix,
    solver::{DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT},
};
use serde::{Deserialize, Serialize};
use web_time::Instant;

/// Solver-agnostic classification of a terminal solver state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    /// Proven optimal within tolerances.
    Optimal,
    /// A feasible point was returned but optimality is not proven.
    FeasibleSuboptimal,
    /// No usable solution (infeasible, numerical failure, limits hit).
    Failed,
}

impl std::fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolveStatus::Optimal => write!(f, "optimal"),
            SolveStatus::FeasibleSuboptimal => write!(f, "feasible_suboptimal"),
            SolveStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Result of one solve call.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub status: SolveStatus,
    /// Backend-specific status, e.g. `"AlmostSolved"`.
    pub raw_status: String,
    /// Primal values indexed by [`VarId`].
    pub values: Vec<f64>,
    pub objective: f64,
    pub iterations: u32,
    pub solve_time_ms: u128,
}

impl SolveOutcome {
    pub fn value(&self, var: VarId) -> f64 {
        self.values.get(var.index()).copied().unwrap_or(0.0)
    }
}

/// Solver settings shared by backends.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    pub max_iterations: u32,
    /// Feasibility and duality-gap tolerance.
    pub tolerance: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1e-8,
        }
    }
}

/// Solves a [`QpModel`]. A model is consumed by exactly one solve.
pub trait SolverAdapter: Send + Sync {
    /// Unique identifier (e.g. "clarabel")
    fn id(&self) -> &str;

    /// Solve the model. `Err` is reserved for setup failures; a solver that
    /// ran and did not converge reports [`SolveStatus::Failed`].
    fn solve(&self, model: QpModel) -> Result<SolveOutcome, ScheduleError>;
}

/// Clarabel interior-point backend (pure Rust, always available).
#[derive(Debug, Clone, Default)]
pub struct ClarabelBackend {
    config: SolverConfig,
}

impl ClarabelBackend {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }
}

/// Map Clarabel's status onto the three-way classification.
pub fn classify_clarabel_status(status: SolverStatus) -> SolveStatus {
    match status {
        SolverStatus::Solved => SolveStatus::Optimal,
        SolverStatus::AlmostSolved => SolveStatus::FeasibleSuboptimal,
        _ => SolveStatus::Failed,
    }
}

impl SolverAdapter for ClarabelBackend {
    fn id(&self) -> &str {
        "clarabel"
    }

    fn solve(&self, model: QpModel) -> Result<SolveOutcome, ScheduleError> {
        let start = Instant::now();
        let n_var = model.num_vars();

        // Column-wise accumulation of A, rows ordered: equalities, then
        // inequalities, then finite variable bounds.
        let mut cols: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n_var];
        let mut rhs: Vec<f64> = Vec::new();
        let mut cones: Vec<SupportedConeT<f64>> = Vec::new();

        for row in model.equalities() {
            let r = rhs.len();
            for &(col, val) in &row.coeffs {
                cols[col].push((r, val));
            }
            rhs.push(row.rhs);
        }
        if !model.equalities().is_empty() {
            cones.push(SupportedConeT::ZeroConeT(model.equalities().len()));
        }

        let n_eq = rhs.len();
        for row in model.inequalities() {
            let r = rhs.len();
            for &(col, val) in &row.coeffs {
                cols[col].push((r, val));
            }
            rhs.push(row.rhs);
        }
        for (col, (&lower, &upper)) in model
            .lower_bounds()
            .iter()
            .zip(model.upper_bounds())
            .enumerate()
        {
            if upper.is_finite() {
                cols[col].push((rhs.len(), 1.0));
                rhs.push(upper);
            }
            if lower.is_finite() {
                cols[col].push((rhs.len(), -1.0));
                rhs.push(-lower);
            }
        }
        if rhs.len() > n_eq {
            cones.push(SupportedConeT::NonnegativeConeT(rhs.len() - n_eq));
        }

        let a_mat = to_csc(rhs.len(), n_var, cols);

        let mut p_cols: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n_var];
        for ((row, col), val) in model.quadratic_entries() {
            p_cols[col].push((row, val));
        }
        let p_mat = to_csc(n_var, n_var, p_cols);
        let q = model.linear_costs().to_vec();

        let settings = DefaultSettingsBuilder::default()
            .verbose(false)
            .max_iter(self.config.max_iterations)
            .tol_feas(self.config.tolerance)
            .tol_gap_abs(self.config.tolerance)
            .tol_gap_rel(self.config.tolerance)
            .build()
            .map_err(|e| ScheduleError::Solver(format!("Clarabel settings error: {:?}", e)))?;

        let mut solver = DefaultSolver::new(&p_mat, &q, &a_mat, &rhs, &cones, settings)
            .map_err(|e| ScheduleError::Solver(format!("Clarabel initialization failed: {:?}", e)))?;

        solver.solve();

        let sol = &solver.solution;
        let values = sol.x.clone();
        let objective = if values.len() == n_var {
            model.objective_value(&values)
        } else {
            f64::NAN
        };
        Ok(SolveOutcome {
            status: classify_clarabel_status(sol.status),
            raw_status: format!("{:?}", sol.status),
            values,
            objective,
            iterations: sol.iterations as u32,
            solve_time_ms: start.elapsed().as_millis(),
        })
    }
}

/// Assemble a CSC matrix from per-column (row, value) lists.
fn to_csc(n_rows: usize, n_cols: usize, mut cols: Vec<Vec<(usize, f64)>>) -> CscMatrix<f64> {
    let mut col_ptr = Vec::with_capacity(n_cols + 1);
    let mut row_idx = Vec::new();
    let mut values = Vec::new();

    for col in cols.iter_mut() {
        col_ptr.push(row_idx.len());
        col.sort_by_key(|(r, _)| *r);
        for &(r, v) in col.iter() {
            row_idx.push(r);
            values.push(v);
        }
    }
    col_ptr.push(row_idx.len());

    CscMatrix::new(n_rows, n_cols, col_ptr, row_idx, values)
}
