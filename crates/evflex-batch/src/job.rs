use anyhow::{anyhow, Result};
use evflex_algo::ScheduleOutcome;
use evflex_core::{Agent, Demand, ResidualLoad};
use serde::{Deserialize, Serialize};

/// Agents per work unit in a national run unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 25;

/// How a run partitions its agents and which schedule each unit computes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Charge immediately on arrival, one unit per region.
    Uncontrolled,
    /// Optimize each region against its own residual load.
    OptRegional,
    /// Optimize capacity-sorted batches against one national residual load.
    OptNational { batch_size: usize },
}

impl Strategy {
    pub fn national() -> Self {
        Strategy::OptNational {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Uncontrolled => "uncontrolled",
            Strategy::OptRegional => "opt-regional",
            Strategy::OptNational { .. } => "opt-national",
        }
    }

    pub fn is_national(&self) -> bool {
        matches!(self, Strategy::OptNational { .. })
    }
}

/// Preprocessed agents and residual load of one region.
#[derive(Debug, Clone)]
pub struct RegionInput {
    pub region_id: String,
    pub agents: Vec<Agent>,
    pub residual: ResidualLoad,
}

/// One piece of work dispatched to a worker.
///
/// Regional units own their residual load; national units carry `None` and
/// solve against the orchestrator's shared snapshot.
#[derive(Debug, Clone)]
pub struct WorkUnit {
    pub name: String,
    pub agents: Vec<Agent>,
    pub residual: Option<ResidualLoad>,
}

/// What a worker sends back: the agents it scheduled, their demand and
/// slack, and the summed demand to merge into the shared residual load.
#[derive(Debug, Clone)]
pub struct UnitResult {
    pub unit: String,
    pub agents: Vec<Agent>,
    pub outcome: ScheduleOutcome,
    pub delta: Demand,
}

impl UnitResult {
    pub fn new(unit: String, agents: Vec<Agent>, outcome: ScheduleOutcome) -> Self {
        let mut delta = Demand::new();
        for demand in outcome.demand.values() {
            delta.extend(demand);
        }
        Self {
            unit,
            agents,
            outcome,
            delta,
        }
    }
}

/// Per-unit line of the run manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnitRecord {
    pub unit: String,
    pub wave: usize,
    pub agents: usize,
    pub total_slack: f64,
    pub suboptimal: usize,
}

impl UnitRecord {
    pub fn from_result(result: &UnitResult, wave: usize) -> Self {
        Self {
            unit: result.unit.clone(),
            wave,
            agents: result.agents.len(),
            total_slack: result.outcome.total_slack(),
            suboptimal: result.outcome.suboptimal.len(),
        }
    }
}

/// One unit per region, in the given order.
pub fn units_from_regions(regions: Vec<RegionInput>) -> Vec<WorkUnit> {
    regions
        .into_iter()
        .map(|region| WorkUnit {
            name: region.region_id,
            agents: region.agents,
            residual: Some(region.residual),
        })
        .collect()
}

/// Sort all agents by ascending capacity and cut the list into contiguous
/// batches of `batch_size`.
pub fn national_units(mut agents: Vec<Agent>, batch_size: usize) -> Result<Vec<WorkUnit>> {
    if batch_size == 0 {
        return Err(anyhow!("national batch size must be positive"));
    }
    agents.sort_by(|a, b| a.capacity.total_cmp(&b.capacity));

    let mut units = Vec::with_capacity(agents.len().div_ceil(batch_size));
    let mut rest = agents;
    let mut index = 0;
    while !rest.is_empty() {
        let tail = rest.split_off(batch_size.min(rest.len()));
        units.push(WorkUnit {
            name: format!("batch-{index:04}"),
            agents: rest,
            residual: None,
        });
        rest = tail;
        index += 1;
    }
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use evflex_core::AgentId;

    fn agent(id: &str, capacity: f64) -> Agent {
        Agent {
            id: AgentId::new(id),
            model: "compact".into(),
            events: Vec::new(),
            capacity,
            evse_group: 0,
            region_id: "r1".into(),
            agg_fac: 1.0,
        }
    }

    #[test]
    fn national_batches_are_capacity_sorted_and_contiguous() {
        let agents = vec![
            agent("a", 5.0),
            agent("b", 1.0),
            agent("c", 3.0),
            agent("d", 2.0),
            agent("e", 4.0),
        ];
        let units = national_units(agents, 2).unwrap();
        let ids: Vec<Vec<&str>> = units
            .iter()
            .map(|u| u.agents.iter().map(|a| a.id.as_str()).collect())
            .collect();
        assert_eq!(ids, vec![vec!["b", "d"], vec!["c", "e"], vec!["a"]]);
        assert_eq!(units[2].name, "batch-0002");
        assert!(units.iter().all(|u| u.residual.is_none()));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        assert!(national_units(vec![agent("a", 1.0)], 0).is_err());
    }

    #[test]
    fn strategy_names() {
        assert_eq!(Strategy::national(), Strategy::OptNational { batch_size: 25 });
        assert_eq!(Strategy::OptRegional.as_str(), "opt-regional");
        assert!(!Strategy::Uncontrolled.is_national());
    }

    #[test]
    fn delta_sums_agent_demand() {
        let mut outcome = ScheduleOutcome::default();
        outcome
            .demand
            .insert(AgentId::new("a"), [(0, 1.0), (1, 2.0)].into_iter().collect());
        outcome
            .demand
            .insert(AgentId::new("b"), [(1, 0.5)].into_iter().collect());
        let result = UnitResult::new("r1".into(), Vec::new(), outcome);
        assert_eq!(result.delta.get(0), 1.0);
        assert_eq!(result.delta.get(1), 2.5);
    }
}
