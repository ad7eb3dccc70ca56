//! Persistence boundary for finished work units.
//!
//! Sinks receive results after each wave, in unit order. Persisting the
//! same agent again replaces its earlier rows.

use crate::job::UnitResult;
use anyhow::{Context, Result};
use csv::Writer;
use evflex_core::{Agent, AgentId, Demand, DemandMap, SlackMap, TimeGrid};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub trait ResultSink {
    fn persist(&mut self, result: &UnitResult) -> Result<()>;

    /// Called once per wave after all of its results were persisted.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Keeps everything in memory; used by tests and for in-process aggregation.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub agents: BTreeMap<AgentId, Agent>,
    pub demand: DemandMap,
    pub slack: SlackMap,
    pub units: Vec<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_slack(&self) -> f64 {
        self.slack.values().sum()
    }
}

impl ResultSink for MemorySink {
    fn persist(&mut self, result: &UnitResult) -> Result<()> {
        for agent in &result.agents {
            let demand = result
                .outcome
                .demand
                .get(&agent.id)
                .cloned()
                .unwrap_or_default();
            let slack = result.outcome.slack.get(&agent.id).copied().unwrap_or(0.0);
            self.agents.insert(agent.id.clone(), agent.clone());
            self.demand.insert(agent.id.clone(), demand);
            self.slack.insert(agent.id.clone(), slack);
        }
        self.units.push(result.unit.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
struct AgentRow {
    agent_id: String,
    region_id: String,
    model: String,
    capacity_mwh: f64,
    evse_group: usize,
    agg_fac: f64,
    slack_mwh: f64,
}

#[derive(Debug, Clone, Serialize)]
struct SeriesRow<'a> {
    agent_id: &'a str,
    step: usize,
    timestamp: String,
    power_mw: f64,
}

/// Charging power rounded down to kW resolution in MW.
pub fn floor_power(power: f64) -> f64 {
    (power * 1000.0).floor() / 1000.0
}

/// Writes `agents.csv` and a sparse `timeseries.csv` into a directory.
///
/// Both files are rewritten on every flush from the rows collected so far.
pub struct CsvSink {
    dir: PathBuf,
    grid: TimeGrid,
    rows: BTreeMap<AgentId, (AgentRow, Demand)>,
}

impl CsvSink {
    pub fn new(dir: impl Into<PathBuf>, grid: TimeGrid) -> Self {
        Self {
            dir: dir.into(),
            grid,
            rows: BTreeMap::new(),
        }
    }

    pub fn agents_path(&self) -> PathBuf {
        self.dir.join("agents.csv")
    }

    pub fn timeseries_path(&self) -> PathBuf {
        self.dir.join("timeseries.csv")
    }

    fn write_agents(&self, path: &Path) -> Result<()> {
        let mut writer = Writer::from_path(path)
            .with_context(|| format!("creating agent table '{}'", path.display()))?;
        for (row, _) in self.rows.values() {
            writer.serialize(row).context("writing agent row")?;
        }
        writer.flush().context("flushing agent table")?;
        Ok(())
    }

    fn write_timeseries(&self, path: &Path) -> Result<()> {
        let mut writer = Writer::from_path(path)
            .with_context(|| format!("creating time series '{}'", path.display()))?;
        for (id, (_, demand)) in &self.rows {
            for (step, power) in demand.iter() {
                let power_mw = floor_power(power);
                if power_mw <= 0.0 {
                    continue;
                }
                writer
                    .serialize(SeriesRow {
                        agent_id: id.as_str(),
                        step,
                        timestamp: self.grid.timestamp(step).format("%Y-%m-%d %H:%M:%S").to_string(),
                        power_mw,
                    })
                    .context("writing time series row")?;
            }
        }
        writer.flush().context("flushing time series")?;
        Ok(())
    }
}

impl ResultSink for CsvSink {
    fn persist(&mut self, result: &UnitResult) -> Result<()> {
        for agent in &result.agents {
            let row = AgentRow {
                agent_id: agent.id.to_string(),
                region_id: agent.region_id.clone(),
                model: agent.model.clone(),
                capacity_mwh: agent.capacity,
                evse_group: agent.evse_group,
                agg_fac: agent.agg_fac,
                slack_mwh: result.outcome.slack.get(&agent.id).copied().unwrap_or(0.0),
            };
            let demand = result
                .outcome
                .demand
                .get(&agent.id)
                .cloned()
                .unwrap_or_default();
            self.rows.insert(agent.id.clone(), (row, demand));
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating output directory '{}'", self.dir.display()))?;
        self.write_agents(&self.agents_path())?;
        self.write_timeseries(&self.timeseries_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evflex_algo::ScheduleOutcome;
    use tempfile::tempdir;

    fn agent(id: &str) -> Agent {
        Agent {
            id: AgentId::new(id),
            model: "compact".into(),
            events: Vec::new(),
            capacity: 0.4,
            evse_group: 1,
            region_id: "r1".into(),
            agg_fac: 10.0,
        }
    }

    fn result(id: &str, power: f64, slack: f64) -> UnitResult {
        let mut outcome = ScheduleOutcome::default();
        outcome
            .demand
            .insert(AgentId::new(id), [(0, power), (2, 0.0004)].into_iter().collect());
        outcome.slack.insert(AgentId::new(id), slack);
        UnitResult::new("r1".into(), vec![agent(id)], outcome)
    }

    #[test]
    fn floors_to_three_decimals() {
        assert_eq!(floor_power(0.12399), 0.123);
        assert_eq!(floor_power(0.0009), 0.0);
    }

    #[test]
    fn memory_sink_replaces_agents() {
        let mut sink = MemorySink::new();
        sink.persist(&result("r1_01", 1.0, 0.5)).unwrap();
        sink.persist(&result("r1_01", 2.0, 0.25)).unwrap();
        assert_eq!(sink.agents.len(), 1);
        assert_eq!(sink.demand[&AgentId::new("r1_01")].get(0), 2.0);
        assert_eq!(sink.total_slack(), 0.25);
    }

    #[test]
    fn csv_sink_is_idempotent_per_agent() {
        let dir = tempdir().unwrap();
        let mut sink = CsvSink::new(dir.path().join("out"), TimeGrid::year_2030());
        sink.persist(&result("r1_01", 0.12345, 0.0)).unwrap();
        sink.flush().unwrap();
        sink.persist(&result("r1_01", 0.12345, 0.0)).unwrap();
        sink.persist(&result("r1_02", 1.0, 0.1)).unwrap();
        sink.flush().unwrap();

        let agents = fs::read_to_string(sink.agents_path()).unwrap();
        assert_eq!(agents.lines().count(), 3);
        assert!(agents.starts_with("agent_id,region_id,model,capacity_mwh"));

        let series = fs::read_to_string(sink.timeseries_path()).unwrap();
        let lines: Vec<&str> = series.lines().collect();
        // Header plus one row per agent; the sub-kW value at step 2 is dropped.
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "r1_01,0,2030-01-01 00:00:00,0.123");
        assert_eq!(lines[2], "r1_02,0,2030-01-01 00:00:00,1.0");
    }
}
