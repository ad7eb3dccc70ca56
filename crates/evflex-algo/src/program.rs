//! Per-agent decision variables and battery-state constraints.
//!
//! For each event `k` with window `[start, stop)`:
//!
//! ```text
//! 0 ≤ p_t ≤ p_max                                  t ∈ [start, stop)
//! 0 ≤ pre_k, post_k ≤ capacity
//! post_k     = pre_k + ηΔt · Σ_t p_t               charging while parked
//! pre_{k+1}  = post_k − consumption_k + slack_k    driving afterwards
//! pre_n      ≥ min(max_end_energy, goal_energy)    terminal target
//! ```
//!
//! `pre_0` is a variable pinned to the start energy, so the returned
//! end-energy variable exists even for a segment without events.

use crate::qp::{QpModel, VarId};
use crate::slack::SlackEstimate;
use evflex_core::{Agent, Event};
use std::collections::BTreeMap;

/// Variables of one agent inside a model.
#[derive(Debug, Clone)]
pub struct AgentProgram {
    /// Charging power variable per time step.
    pub power: BTreeMap<usize, VarId>,
    /// Energy after the last event; seeds the next segment.
    pub end_energy: VarId,
}

/// Builder for one agent's constraints over one group of events.
#[derive(Debug, Clone)]
pub struct AgentProgramBuilder<'a> {
    agent: &'a Agent,
    events: &'a [Event],
    eta_dt: f64,
    slack: Vec<f64>,
    max_end_energy: f64,
    start_energy: f64,
    goal_energy: f64,
}

impl<'a> AgentProgramBuilder<'a> {
    /// Builder with zero slack, start and goal energy at zero and no cap on
    /// the terminal target.
    pub fn new(agent: &'a Agent, events: &'a [Event], eta_dt: f64) -> Self {
        Self {
            agent,
            events,
            eta_dt,
            slack: vec![0.0; events.len()],
            max_end_energy: f64::INFINITY,
            start_energy: 0.0,
            goal_energy: 0.0,
        }
    }

    /// Use a precomputed slack estimate: per-event injections and the
    /// reachable end energy.
    pub fn with_slack(mut self, estimate: &SlackEstimate) -> Self {
        self.slack = estimate.per_event.clone();
        self.slack.resize(self.events.len(), 0.0);
        self.max_end_energy = estimate.end_energy;
        self
    }

    pub fn with_start_energy(mut self, energy: f64) -> Self {
        self.start_energy = energy;
        self
    }

    pub fn with_goal_energy(mut self, energy: f64) -> Self {
        self.goal_energy = energy;
        self
    }

    /// Terminal bound actually enforced.
    pub fn end_energy_bound(&self) -> f64 {
        self.max_end_energy.min(self.goal_energy)
    }

    pub fn build(&self, model: &mut QpModel) -> AgentProgram {
        let capacity = self.agent.capacity;
        let mut power = BTreeMap::new();

        let mut pre = model.add_var(0.0, capacity);
        model.add_eq(&[(pre, 1.0)], self.start_energy.clamp(0.0, capacity));

        for (idx, event) in self.events.iter().enumerate() {
            let mut balance: Vec<(VarId, f64)> = Vec::with_capacity(event.duration() + 2);
            for t in event.steps() {
                let p = model.add_var(0.0, event.p_max());
                power.insert(t, p);
                balance.push((p, self.eta_dt));
            }
            let post = model.add_var(0.0, capacity);
            let next_pre = model.add_var(0.0, capacity);

            // pre + ηΔt·Σp − post = 0
            balance.push((pre, 1.0));
            balance.push((post, -1.0));
            model.add_eq(&balance, 0.0);

            // post − next_pre = consumption − slack
            model.add_eq(
                &[(post, 1.0), (next_pre, -1.0)],
                event.consumption() - self.slack[idx],
            );
            pre = next_pre;
        }

        model.add_geq(&[(pre, 1.0)], self.end_energy_bound());

        AgentProgram {
            power,
            end_energy: pre,
        }
    }
}
