pub mod config;
pub mod fleet;
pub mod mobility;
pub mod regions;
pub mod residual;

pub use config::{
    load_config_from_path, ChargerClass, EvModel, EvseScenario, PrivateGroup, PublicCharging,
    RunConfig,
};
pub use fleet::{charge_power, ev_model_assignment, evse_group_assignment, Location};
pub use mobility::{build_agents, consumption_kwh, parking_events, read_trips, Trip, VehicleContext};
pub use regions::{aggregation_factors, read_regions, RegionRecord};
pub use residual::{read_residual, region_residual, total_residual};
