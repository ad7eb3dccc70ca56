use crate::job::{national_units, units_from_regions, RegionInput, Strategy, UnitRecord, UnitResult, WorkUnit};
use crate::manifest::{write_run_manifest, RunManifest};
use crate::sink::ResultSink;
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use evflex_algo::{charge_immediately, ScheduleParams, SequentialScheduler, SolverAdapter};
use evflex_core::{Agent, ResidualLoad, SegmentBoundaries};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use tracing::{debug, info};
use web_time::Instant;

/// Orchestrator settings.
pub struct OrchestratorConfig {
    pub strategy: Strategy,
    /// Units per wave and worker threads; `0` uses every CPU.
    pub n_worker: usize,
    pub params: ScheduleParams,
    /// Horizon split applied inside every unit; `None` solves each agent in one piece.
    pub segments: Option<SegmentBoundaries>,
    /// Directory for `run_manifest.json`; nothing is written when unset.
    pub output_root: Option<PathBuf>,
}

/// Returned after the run so callers can log unit counts and slack.
#[derive(Debug)]
pub struct RunSummary {
    pub waves: usize,
    pub units: Vec<UnitRecord>,
    pub num_agents: usize,
    pub total_slack: f64,
    pub elapsed_secs: f64,
    pub manifest_path: Option<PathBuf>,
}

/// Dispatches work units in waves of at most `n_worker` concurrent units.
///
/// Every unit of a wave solves against the same residual snapshot. In a
/// national run the orchestrator owns the only mutable residual load and
/// merges the wave's demand into it before the next wave starts. A failed
/// unit aborts the run; results of its wave are not persisted.
pub struct Orchestrator {
    config: OrchestratorConfig,
    solver: Arc<dyn SolverAdapter>,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig, solver: Arc<dyn SolverAdapter>) -> Self {
        Self { config, solver }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Region-independent run: one unit per region, each against its own
    /// residual load. Valid for `Uncontrolled` and `OptRegional`.
    pub fn run_regions(&self, regions: Vec<RegionInput>, sink: &mut dyn ResultSink) -> Result<RunSummary> {
        if self.config.strategy.is_national() {
            return Err(anyhow!(
                "strategy {} needs a national residual load, use run_national",
                self.config.strategy.as_str()
            ));
        }
        self.execute(units_from_regions(regions), None, sink)
    }

    /// National run: capacity-sorted batches against one shared residual
    /// load, which holds the fleet's demand afterwards.
    pub fn run_national(
        &self,
        agents: Vec<Agent>,
        residual: &mut ResidualLoad,
        sink: &mut dyn ResultSink,
    ) -> Result<RunSummary> {
        let Strategy::OptNational { batch_size } = self.config.strategy else {
            return Err(anyhow!(
                "strategy {} does not share a national residual load, use run_regions",
                self.config.strategy.as_str()
            ));
        };
        let units = national_units(agents, batch_size)?;
        self.execute(units, Some(residual), sink)
    }

    fn build_pool(&self) -> Result<ThreadPool> {
        let thread_count = if self.config.n_worker == 0 {
            num_cpus::get()
        } else {
            self.config.n_worker
        };
        ThreadPoolBuilder::new()
            .num_threads(thread_count)
            .build()
            .context("building Rayon thread pool for work units")
    }

    fn execute(
        &self,
        units: Vec<WorkUnit>,
        mut shared: Option<&mut ResidualLoad>,
        sink: &mut dyn ResultSink,
    ) -> Result<RunSummary> {
        let started = Instant::now();
        let pool = self.build_pool()?;
        let wave_size = pool.current_num_threads().max(1);

        let mut records = Vec::with_capacity(units.len());
        let mut num_agents = 0;
        let mut total_slack = 0.0;
        let mut waves = 0;

        for (wave, chunk) in units.chunks(wave_size).enumerate() {
            let names: Vec<&str> = chunk.iter().map(|u| u.name.as_str()).collect();
            info!(wave, units = ?names, "Starting");
            let wave_started = Instant::now();

            let snapshot = shared.as_deref().map(ResidualLoad::snapshot);
            let results = self.dispatch_wave(&pool, chunk, snapshot)?;

            if let Some(residual) = shared.as_deref_mut() {
                for result in &results {
                    residual
                        .add_demand(&result.delta)
                        .with_context(|| format!("merging demand of unit {}", result.unit))?;
                }
            }
            for result in &results {
                sink.persist(result)
                    .with_context(|| format!("persisting unit {}", result.unit))?;
                let record = UnitRecord::from_result(result, wave);
                num_agents += record.agents;
                total_slack += record.total_slack;
                records.push(record);
            }
            sink.flush().context("flushing results")?;

            info!(
                wave,
                units = ?names,
                "Done in {:.1} secs",
                wave_started.elapsed().as_secs_f64()
            );
            waves += 1;
        }

        let elapsed_secs = started.elapsed().as_secs_f64();
        let manifest_path = match &self.config.output_root {
            Some(root) => {
                let path = root.join("run_manifest.json");
                let manifest = RunManifest {
                    created_at: Utc::now(),
                    strategy: self.config.strategy.as_str().to_string(),
                    n_worker: wave_size,
                    waves,
                    num_units: records.len(),
                    num_agents,
                    total_slack,
                    elapsed_secs,
                    units: records.clone(),
                };
                write_run_manifest(&path, &manifest)?;
                Some(path)
            }
            None => None,
        };

        Ok(RunSummary {
            waves,
            units: records,
            num_agents,
            total_slack,
            elapsed_secs,
            manifest_path,
        })
    }

    /// Run one wave to completion and return its results in unit order.
    ///
    /// Each unit gets its own one-shot channel. All units finish before any
    /// result is inspected; the first failure in unit order is reported.
    fn dispatch_wave(
        &self,
        pool: &ThreadPool,
        wave: &[WorkUnit],
        snapshot: Option<Arc<[f64]>>,
    ) -> Result<Vec<UnitResult>> {
        let mut receivers = Vec::with_capacity(wave.len());
        pool.scope(|scope| {
            for unit in wave {
                let (tx, rx) = mpsc::sync_channel(1);
                receivers.push(rx);
                let snapshot = snapshot.clone();
                scope.spawn(move |_| {
                    // The receiver outlives the scope.
                    let _ = tx.send(self.solve_unit(unit, snapshot));
                });
            }
        });

        let mut results = Vec::with_capacity(wave.len());
        for (unit, rx) in wave.iter().zip(receivers) {
            let result = rx
                .recv()
                .map_err(|_| anyhow!("worker for unit {} exited without a result", unit.name))?;
            results.push(result.with_context(|| format!("solving unit {}", unit.name))?);
        }
        Ok(results)
    }

    fn solve_unit(&self, unit: &WorkUnit, snapshot: Option<Arc<[f64]>>) -> Result<UnitResult> {
        let started = Instant::now();
        let outcome = match self.config.strategy {
            Strategy::Uncontrolled => charge_immediately(&unit.agents, &self.config.params)?,
            Strategy::OptRegional | Strategy::OptNational { .. } => {
                let mut residual = match (&unit.residual, snapshot) {
                    (Some(own), _) => own.clone(),
                    (None, Some(shared)) => ResidualLoad::from(&shared[..]),
                    (None, None) => {
                        return Err(anyhow!("unit {} has no residual load", unit.name));
                    }
                };
                let mut scheduler = SequentialScheduler::new(self.solver.clone(), self.config.params);
                if let Some(segments) = &self.config.segments {
                    scheduler = scheduler.with_segments(segments.clone());
                }
                scheduler.run(&unit.agents, &mut residual)?
            }
        };
        debug!(
            unit = %unit.name,
            agents = unit.agents.len(),
            secs = started.elapsed().as_secs_f64(),
            "unit finished"
        );
        Ok(UnitResult::new(unit.name.clone(), unit.agents.clone(), outcome))
    }
}
