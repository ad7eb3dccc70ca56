//! Uncontrolled baseline: every vehicle charges at full power from arrival
//! until the battery is full or it leaves.

use crate::scheduler::{ScheduleOutcome, ScheduleParams, UnitState};
use crate::ScheduleError;
use evflex_core::{Agent, Demand};

/// Simulate immediate charging for each agent independently.
///
/// Per step of a parking event the battery takes
/// `min(p_max·ηΔt, capacity − E)`; the recorded power is that energy divided
/// by `ηΔt`. The trip consumption is removed after the event and any deficit
/// is counted as slack.
pub fn charge_immediately(agents: &[Agent], params: &ScheduleParams) -> Result<ScheduleOutcome, ScheduleError> {
    params.validate()?;
    let eta_dt = params.eta_dt();
    let mut outcome = ScheduleOutcome::default();

    for agent in agents {
        let mut energy = agent.start_energy(params.soc_start);
        let mut demand = Demand::new();
        let mut slack = 0.0;

        for event in &agent.events {
            for t in event.steps() {
                let charge = (event.p_max() * eta_dt).min(agent.capacity - energy).max(0.0);
                if charge <= 0.0 {
                    break;
                }
                energy += charge;
                demand.add(t, charge / eta_dt);
            }
            energy -= event.consumption();
            if energy < 0.0 {
                slack += -energy;
                energy = 0.0;
            }
        }

        outcome.demand.insert(agent.id.clone(), demand);
        outcome.slack.insert(agent.id.clone(), slack);
        outcome
            .ledger
            .insert((agent.id.clone(), 0), UnitState::Solved);
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use evflex_core::{AgentId, Event};

    fn agent(events: Vec<Event>) -> Agent {
        Agent {
            id: AgentId::new("r1_00"),
            model: "compact".into(),
            events,
            capacity: 10.0,
            evse_group: 0,
            region_id: "r1".into(),
            agg_fac: 1.0,
        }
    }

    #[test]
    fn charges_front_loaded_until_full() {
        let a = agent(vec![Event::new(0, 4, 3.0, 2.0, 7).unwrap()]);
        let params = ScheduleParams::new(1.0, 0.5).with_delta_t(1.0);
        let outcome = charge_immediately(&[a], &params).unwrap();

        let demand = &outcome.demand[&AgentId::new("r1_00")];
        assert_eq!(demand.get(0), 2.0);
        assert_eq!(demand.get(1), 2.0);
        assert_eq!(demand.get(2), 1.0);
        assert_eq!(demand.get(3), 0.0);
        assert_eq!(outcome.total_slack(), 0.0);
    }

    #[test]
    fn deficit_after_trip_is_slack() {
        let a = agent(vec![
            Event::new(0, 2, 8.0, 0.0, 1).unwrap(),
            Event::new(2, 4, 0.0, 1.0, 7).unwrap(),
        ]);
        let params = ScheduleParams::new(1.0, 0.5).with_delta_t(1.0);
        let outcome = charge_immediately(&[a], &params).unwrap();
        assert_eq!(outcome.total_slack(), 3.0);
        // Battery empty after the trip, so the second stop charges fully.
        let demand = &outcome.demand[&AgentId::new("r1_00")];
        assert_eq!(demand.total_power(), 2.0);
    }

    #[test]
    fn efficiency_scales_power_back() {
        let a = agent(vec![Event::new(0, 1, 0.0, 4.0, 7).unwrap()]);
        let params = ScheduleParams::new(0.5, 0.0).with_delta_t(1.0);
        let outcome = charge_immediately(&[a], &params).unwrap();
        // 4 MW at ηΔt = 0.5 stores 2 MWh and is recorded as 4 MW.
        assert_eq!(outcome.demand[&AgentId::new("r1_00")].get(0), 4.0);
    }
}
