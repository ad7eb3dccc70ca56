//! Feasibility slack from a forward "always charge at full power" simulation.
//!
//! If even maximal charging cannot cover a trip, the deficit is injected as
//! slack so the optimization program stays feasible. Slack is fixed before
//! solving and never optimized.

use evflex_core::{Agent, Event};

/// Per-event slack and the best reachable energy at the end of the events.
#[derive(Debug, Clone, PartialEq)]
pub struct SlackEstimate {
    pub per_event: Vec<f64>,
    /// Energy after the last event under maximal charging, used to cap the
    /// terminal energy target.
    pub end_energy: f64,
}

impl SlackEstimate {
    pub fn total(&self) -> f64 {
        self.per_event.iter().sum()
    }
}

/// Simulate the events forward with maximal charging.
///
/// At each event the battery takes `min(p_max·ηΔt·duration, capacity − E)`,
/// then the trip consumption is removed; a negative result is recorded as
/// slack and the energy clamps to zero.
pub fn estimate_slack(agent: &Agent, events: &[Event], start_energy: f64, eta_dt: f64) -> SlackEstimate {
    let mut per_event = Vec::with_capacity(events.len());
    let mut energy = start_energy;

    for event in events {
        let charge = (event.p_max() * eta_dt * event.duration() as f64)
            .min(agent.capacity - energy)
            .max(0.0);
        energy += charge;
        energy -= event.consumption();
        if energy < 0.0 {
            per_event.push(-energy);
            energy = 0.0;
        } else {
            per_event.push(0.0);
        }
    }

    SlackEstimate {
        per_event,
        end_energy: energy,
    }
}
