//! EV load curves aggregated from scheduled demand.

use anyhow::{anyhow, Context, Result};
use csv::Writer;
use evflex_core::{Agent, DemandMap, TimeGrid};
use std::collections::BTreeMap;
use std::path::Path;

/// Fleet charging power per step.
pub fn total_ev_load(demand: &DemandMap, n_steps: usize) -> Result<Vec<f64>> {
    let mut load = vec![0.0; n_steps];
    for (agent, profile) in demand {
        for (step, power) in profile.iter() {
            let slot = load
                .get_mut(step)
                .ok_or_else(|| anyhow!("agent {agent} has demand at step {step} beyond {n_steps}"))?;
            *slot += power;
        }
    }
    Ok(load)
}

/// Charging power per region and step; agents without demand still
/// contribute an all-zero curve for their region.
pub fn regional_ev_load<'a>(
    agents: impl IntoIterator<Item = &'a Agent>,
    demand: &DemandMap,
    n_steps: usize,
) -> Result<BTreeMap<String, Vec<f64>>> {
    let mut curves: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for agent in agents {
        let curve = curves
            .entry(agent.region_id.clone())
            .or_insert_with(|| vec![0.0; n_steps]);
        let Some(profile) = demand.get(&agent.id) else {
            continue;
        };
        for (step, power) in profile.iter() {
            let slot = curve.get_mut(step).ok_or_else(|| {
                anyhow!("agent {} has demand at step {step} beyond {n_steps}", agent.id)
            })?;
            *slot += power;
        }
    }
    Ok(curves)
}

/// Write named curves as columns next to a `TimeStamp` column.
pub fn write_load_curves(path: &Path, grid: &TimeGrid, curves: &BTreeMap<String, Vec<f64>>) -> Result<()> {
    let n_steps = grid.n_steps();
    if let Some((name, curve)) = curves.iter().find(|(_, c)| c.len() != n_steps) {
        return Err(anyhow!(
            "load curve '{name}' has {} steps, grid has {n_steps}",
            curve.len()
        ));
    }

    let mut writer = Writer::from_path(path)
        .with_context(|| format!("creating load curve file '{}'", path.display()))?;
    let mut header = vec!["TimeStamp".to_string()];
    header.extend(curves.keys().cloned());
    writer.write_record(&header).context("writing load curve header")?;

    for (step, ts) in grid.timestamps().enumerate() {
        let mut record = vec![ts.format("%Y-%m-%d %H:%M:%S").to_string()];
        record.extend(curves.values().map(|curve| curve[step].to_string()));
        writer.write_record(&record).context("writing load curve row")?;
    }
    writer.flush().context("flushing load curve file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use evflex_core::{AgentId, Demand};
    use std::fs;
    use tempfile::tempdir;

    fn agent(id: &str, region: &str) -> Agent {
        Agent {
            id: AgentId::new(id),
            model: "compact".into(),
            events: Vec::new(),
            capacity: 1.0,
            evse_group: 0,
            region_id: region.into(),
            agg_fac: 1.0,
        }
    }

    fn demand() -> DemandMap {
        let mut map = DemandMap::new();
        map.insert(AgentId::new("a_01"), [(0, 1.0), (2, 0.5)].into_iter().collect::<Demand>());
        map.insert(AgentId::new("a_02"), [(2, 0.5)].into_iter().collect::<Demand>());
        map.insert(AgentId::new("b_01"), [(1, 2.0)].into_iter().collect::<Demand>());
        map
    }

    #[test]
    fn totals_and_regions_add_up() {
        let agents = vec![agent("a_01", "a"), agent("a_02", "a"), agent("b_01", "b"), agent("c_01", "c")];
        let demand = demand();
        assert_eq!(total_ev_load(&demand, 3).unwrap(), vec![1.0, 2.0, 1.0]);

        let regions = regional_ev_load(&agents, &demand, 3).unwrap();
        assert_eq!(regions["a"], vec![1.0, 0.0, 1.0]);
        assert_eq!(regions["b"], vec![0.0, 2.0, 0.0]);
        assert_eq!(regions["c"], vec![0.0; 3]);
    }

    #[test]
    fn demand_beyond_horizon_is_an_error() {
        assert!(total_ev_load(&demand(), 2).is_err());
    }

    #[test]
    fn curves_are_written_with_timestamps() {
        let start = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let end = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap().and_hms_opt(0, 45, 0).unwrap();
        let grid = TimeGrid::new(start, end, 900).unwrap();
        let mut curves = BTreeMap::new();
        curves.insert("total".to_string(), vec![1.0, 2.0, 1.5]);

        let dir = tempdir().unwrap();
        let path = dir.path().join("load.csv");
        write_load_curves(&path, &grid, &curves).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "TimeStamp,total");
        assert_eq!(lines[2], "2030-01-01 00:15:00,2");
        assert_eq!(lines.len(), 4);
    }
}
