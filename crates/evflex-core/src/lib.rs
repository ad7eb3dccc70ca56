//! # evflex-core: EV Charging Data Model
//!
//! Shared types for the charging-schedule optimizer:
//!
//! - [`Event`] and [`Agent`]: mobility-derived parking intervals of a vehicle
//! - [`ResidualLoad`]: non-EV demand the schedule is flattened against
//! - [`Demand`]: sparse per-agent charging power
//! - [`TimeGrid`], [`Horizon`], [`SegmentBoundaries`]: the time axis and its
//!   split into optimization segments
//!
//! Agents, events and the residual curve are produced once per run by
//! preprocessing and are read-only afterwards; only the orchestrator mutates
//! the residual load, between waves.

pub mod error;
pub mod grid;
pub mod load;
pub mod types;

pub use error::{EvError, EvResult};
pub use grid::{Horizon, SegmentBoundaries, TimeGrid};
pub use load::{Demand, DemandMap, ResidualLoad, SlackMap};
pub use types::{Agent, AgentId, Event};
