//! Sequential, capacity-ordered scheduling.
//!
//! Agents are solved one at a time in ascending battery capacity; each
//! agent's segments are solved in temporal order. After every segment the
//! committed demand is added to the residual load, so later agents see it as
//! background load. This single sweep approximates the joint optimum of
//! [`crate::joint::solve_joint`] at a fraction of the cost; the capacity
//! order is a heuristic, not a proven error minimizer.

use crate::objective::assemble_objective;
use crate::program::AgentProgramBuilder;
use crate::qp::{QpModel, SolveStatus, SolverAdapter};
use crate::segment::split_events;
use crate::slack::estimate_slack;
use crate::ScheduleError;
use evflex_core::{
    Agent, AgentId, Demand, DemandMap, Event, ResidualLoad, SegmentBoundaries, SlackMap, TimeGrid,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Solver output below this is treated as no charging.
pub const DEMAND_THRESHOLD: f64 = 1e-8;

/// Physical parameters shared by all agents of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduleParams {
    /// Charging efficiency η in (0, 1].
    pub efficiency: f64,
    /// Initial state of charge as a fraction of capacity; also the goal at
    /// the end of every segment.
    pub soc_start: f64,
    /// Step length Δt in hours.
    pub delta_t: f64,
}

impl ScheduleParams {
    /// Parameters on the default 15-minute grid.
    pub fn new(efficiency: f64, soc_start: f64) -> Self {
        Self::for_grid(efficiency, soc_start, &TimeGrid::default())
    }

    /// Parameters whose step length follows `grid`'s resolution.
    pub fn for_grid(efficiency: f64, soc_start: f64, grid: &TimeGrid) -> Self {
        Self {
            efficiency,
            soc_start,
            delta_t: grid.delta_hours(),
        }
    }

    pub fn with_delta_t(mut self, delta_t: f64) -> Self {
        self.delta_t = delta_t;
        self
    }

    /// Energy per unit power per step.
    pub fn eta_dt(&self) -> f64 {
        self.efficiency * self.delta_t
    }

    pub fn validate(&self) -> Result<(), ScheduleError> {
        if !(self.efficiency > 0.0 && self.efficiency <= 1.0) {
            return Err(ScheduleError::InvalidInput(format!(
                "charging efficiency {} outside (0, 1]",
                self.efficiency
            )));
        }
        if !(0.0..=1.0).contains(&self.soc_start) {
            return Err(ScheduleError::InvalidInput(format!(
                "start SOC {} outside [0, 1]",
                self.soc_start
            )));
        }
        if !(self.delta_t.is_finite() && self.delta_t > 0.0) {
            return Err(ScheduleError::InvalidInput(format!(
                "step length {} must be positive",
                self.delta_t
            )));
        }
        Ok(())
    }
}

/// Progress of one (agent, segment) unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitState {
    Pending,
    Solved,
}

/// Demand and slack of a set of agents plus the per-unit bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct ScheduleOutcome {
    pub demand: DemandMap,
    pub slack: SlackMap,
    pub ledger: BTreeMap<(AgentId, usize), UnitState>,
    /// Units accepted with a feasible but not proven optimal solution.
    pub suboptimal: Vec<(AgentId, usize)>,
}

impl ScheduleOutcome {
    pub fn total_slack(&self) -> f64 {
        self.slack.values().sum()
    }

    pub fn solved_units(&self) -> usize {
        self.ledger
            .values()
            .filter(|state| **state == UnitState::Solved)
            .count()
    }

    /// Fold another outcome in; agents are assumed disjoint.
    pub fn merge(&mut self, other: ScheduleOutcome) {
        self.demand.extend(other.demand);
        self.slack.extend(other.slack);
        self.ledger.extend(other.ledger);
        self.suboptimal.extend(other.suboptimal);
    }
}

/// Drives per-agent, per-segment solves against a mutable residual load.
pub struct SequentialScheduler {
    solver: Arc<dyn SolverAdapter>,
    params: ScheduleParams,
    segments: Option<SegmentBoundaries>,
}

impl SequentialScheduler {
    /// Scheduler solving each agent's whole event list as one program.
    pub fn new(solver: Arc<dyn SolverAdapter>, params: ScheduleParams) -> Self {
        Self {
            solver,
            params,
            segments: None,
        }
    }

    /// Split every agent's events at these boundaries.
    pub fn with_segments(mut self, segments: SegmentBoundaries) -> Self {
        self.segments = Some(segments);
        self
    }

    pub fn params(&self) -> &ScheduleParams {
        &self.params
    }

    /// Schedule `agents` and add their demand to `residual`.
    ///
    /// A `FeasibleSuboptimal` solve is logged and accepted. Any `Failed`
    /// solve aborts with the agent and segment identity; the residual load
    /// then holds the demand of the units solved before it and should be
    /// discarded by the caller.
    pub fn run(&self, agents: &[Agent], residual: &mut ResidualLoad) -> Result<ScheduleOutcome, ScheduleError> {
        self.params.validate()?;
        let eta_dt = self.params.eta_dt();

        let mut order: Vec<&Agent> = agents.iter().collect();
        order.sort_by(|a, b| a.capacity.total_cmp(&b.capacity));

        let mut outcome = ScheduleOutcome::default();

        for agent in order {
            let last_stop = agent.events.iter().map(Event::stop).max().unwrap_or(0);
            if last_stop > residual.len() {
                return Err(ScheduleError::InvalidInput(format!(
                    "agent {} has events up to step {last_stop}, residual load has {} steps",
                    agent.id,
                    residual.len()
                )));
            }

            let groups = match &self.segments {
                Some(boundaries) => split_events(&agent.events, boundaries),
                None => vec![agent.events.clone()],
            };
            for segment in 0..groups.len() {
                outcome
                    .ledger
                    .insert((agent.id.clone(), segment), UnitState::Pending);
            }

            let goal_energy = agent.start_energy(self.params.soc_start);
            let mut start_energy = goal_energy;
            let mut agent_demand = Demand::new();
            let mut agent_slack = 0.0;

            for (segment, events) in groups.iter().enumerate() {
                if !events.is_empty() {
                    let estimate = estimate_slack(agent, events, start_energy, eta_dt);
                    agent_slack += estimate.total();

                    let mut model = QpModel::new();
                    let program = AgentProgramBuilder::new(agent, events, eta_dt)
                        .with_slack(&estimate)
                        .with_start_energy(start_energy)
                        .with_goal_energy(goal_energy)
                        .build(&mut model);
                    assemble_objective(&mut model, &program.power, residual.as_slice());

                    let solved = self.solver.solve(model)?;
                    match solved.status {
                        SolveStatus::Optimal => {}
                        SolveStatus::FeasibleSuboptimal => {
                            warn!(
                                agent = %agent.id,
                                segment,
                                status = %solved.raw_status,
                                "solution suboptimal, accepting"
                            );
                            outcome.suboptimal.push((agent.id.clone(), segment));
                        }
                        SolveStatus::Failed => {
                            return Err(ScheduleError::SolveFailed {
                                agent: agent.id.clone(),
                                segment,
                                status: solved.raw_status,
                            });
                        }
                    }

                    let segment_demand: Demand = program
                        .power
                        .iter()
                        .map(|(&t, &p)| (t, solved.value(p)))
                        .filter(|&(_, power)| power > DEMAND_THRESHOLD)
                        .collect();
                    residual
                        .add_demand(&segment_demand)
                        .map_err(|e| ScheduleError::InvalidInput(e.to_string()))?;
                    agent_demand.extend(&segment_demand);

                    start_energy = solved.value(program.end_energy).clamp(0.0, agent.capacity);
                    debug!(
                        agent = %agent.id,
                        segment,
                        events = events.len(),
                        objective = solved.objective,
                        iterations = solved.iterations,
                        "segment solved"
                    );
                }
                outcome
                    .ledger
                    .insert((agent.id.clone(), segment), UnitState::Solved);
            }

            outcome.demand.insert(agent.id.clone(), agent_demand);
            outcome.slack.insert(agent.id.clone(), agent_slack);
        }

        Ok(outcome)
    }
}
