use anyhow::{anyhow, Context, Result};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Vehicles simulated per region by the mobility model.
pub const SIMULATED_VEHICLES_PER_REGION: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRecord {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "RegisteredCars")]
    pub registered_cars: f64,
}

/// Read the `;`-separated region table (`ID;RegisteredCars;...`).
pub fn read_regions(path: &Path) -> Result<Vec<RegionRecord>> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("opening region table '{}'", path.display()))?;
    let mut regions = Vec::new();
    for result in rdr.deserialize() {
        let record: RegionRecord = result.context("parsing region record")?;
        regions.push(record);
    }
    Ok(regions)
}

/// Real vehicles represented by one simulated vehicle in each region.
///
/// The EV fleet is spread over regions in proportion to registered cars;
/// each region's share is then divided over its simulated vehicles.
pub fn aggregation_factors(regions: &[RegionRecord], fleetsize: f64) -> Result<Vec<f64>> {
    let registered: f64 = regions.iter().map(|r| r.registered_cars).sum();
    if !(registered > 0.0) {
        return Err(anyhow!("regions have no registered cars"));
    }
    let penetration = fleetsize / registered;
    Ok(regions
        .iter()
        .map(|r| r.registered_cars * penetration / SIMULATED_VEHICLES_PER_REGION)
        .collect())
}
