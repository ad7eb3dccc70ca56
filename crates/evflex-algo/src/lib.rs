//! # evflex-algo: Charging-Schedule Optimization
//!
//! Computes EV charging schedules that flatten the aggregate of residual
//! load and fleet charging power.
//!
//! ## Pipeline
//!
//! | Stage | Item | Role |
//! |-------|------|------|
//! | Segmentation | [`plan_boundaries`], [`split_events`] | Bound program size by day, week or month |
//! | Feasibility | [`estimate_slack`] | Fixed energy top-up where charging cannot cover a trip |
//! | Constraints | [`AgentProgramBuilder`] | Power and battery-state variables per event |
//! | Objective | [`assemble_objective`] | `Σ_t [2·r_t·p_t + p_t²]` against a residual snapshot |
//! | Solve | [`SolverAdapter`], [`ClarabelBackend`] | Convex QP, three-way status |
//! | Sweep | [`SequentialScheduler`] | Capacity-ordered agents, residual refreshed per segment |
//!
//! [`solve_joint`] builds the exact all-agents program for comparison and
//! [`charge_immediately`] is the uncontrolled reference strategy.
//!
//! ## Example
//!
//! ```ignore
//! use evflex_algo::{plan_boundaries, ClarabelBackend, ScheduleParams, SequentialScheduler};
//! use evflex_core::Horizon;
//! use std::sync::Arc;
//!
//! let scheduler = SequentialScheduler::new(Arc::new(ClarabelBackend::default()), ScheduleParams::new(0.9, 0.5))
//!     .with_segments(plan_boundaries(&grid, Horizon::Week));
//! let outcome = scheduler.run(&agents, &mut residual)?;
//! println!("total slack: {:.3} MWh", outcome.total_slack());
//! ```

pub mod error;
pub mod joint;
pub mod objective;
pub mod program;
pub mod qp;
pub mod scheduler;
pub mod segment;
pub mod slack;
pub mod uncontrolled;

pub use error::ScheduleError;
pub use joint::solve_joint;
pub use objective::{assemble_joint_objective, assemble_objective};
pub use program::{AgentProgram, AgentProgramBuilder};
pub use qp::{ClarabelBackend, QpModel, SolveOutcome, SolveStatus, SolverAdapter, SolverConfig, VarId};
pub use scheduler::{ScheduleOutcome, ScheduleParams, SequentialScheduler, UnitState, DEMAND_THRESHOLD};
pub use segment::{plan_boundaries, split_events};
pub use slack::{estimate_slack, SlackEstimate};
pub use uncontrolled::charge_immediately;
