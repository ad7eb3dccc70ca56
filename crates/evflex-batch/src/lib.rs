pub mod job;
pub mod manifest;
pub mod runner;
pub mod sink;
pub mod study;
pub mod summary;

pub use job::{
    national_units, units_from_regions, RegionInput, Strategy, UnitRecord, UnitResult, WorkUnit,
    DEFAULT_BATCH_SIZE,
};
pub use manifest::{load_run_manifest, write_run_manifest, RunManifest};
pub use runner::{Orchestrator, OrchestratorConfig, RunSummary};
pub use sink::{floor_power, CsvSink, MemorySink, ResultSink};
pub use study::{run_study, StudySpec};
pub use summary::{regional_ev_load, total_ev_load, write_load_curves};
