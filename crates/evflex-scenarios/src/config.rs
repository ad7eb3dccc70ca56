use anyhow::{anyhow, Context, Result};
use evflex_algo::{plan_boundaries, ScheduleParams};
use evflex_core::{Horizon, SegmentBoundaries, TimeGrid};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Tolerance for distribution shares summing to one.
pub const SHARE_TOLERANCE: f64 = 1e-6;

/// Run-wide settings: optimization horizon, battery physics, fleet
/// distributions and charging-infrastructure scenarios.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_horizon", deserialize_with = "deserialize_horizon")]
    pub horizon: Horizon,
    #[serde(rename = "chargingEfficiency")]
    pub charging_efficiency: f64,
    #[serde(rename = "SOCStart")]
    pub soc_start: f64,
    /// Number of EVs in the whole study area.
    #[serde(default)]
    pub fleetsize: f64,
    #[serde(rename = "sensiAdjFS", default = "default_sensitivity")]
    pub sensi_adj_fleetsize: f64,
    #[serde(rename = "sensiAdjCap", default = "default_sensitivity")]
    pub sensi_adj_capacity: f64,
    #[serde(rename = "sensiAdjCons", default = "default_sensitivity")]
    pub sensi_adj_consumption: f64,
    #[serde(rename = "sensiAdjP", default = "default_sensitivity")]
    pub sensi_adj_power: f64,
    #[serde(rename = "eVModels")]
    pub ev_models: BTreeMap<String, EvModel>,
    pub scenarios: BTreeMap<String, EvseScenario>,
}

fn default_horizon() -> Horizon {
    Horizon::Full
}

fn default_sensitivity() -> f64 {
    1.0
}

fn deserialize_horizon<'de, D>(deserializer: D) -> std::result::Result<Horizon, D::Error>
where
    D: Deserializer<'de>,
{
    let code = String::deserialize(deserializer)?;
    code.parse().map_err(serde::de::Error::custom)
}

/// Vehicle model parameters, in kWh and kW.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvModel {
    pub share: f64,
    #[serde(rename = "capacity_kWh")]
    pub capacity_kwh: f64,
    #[serde(rename = "consCITY_kWh/100km")]
    pub cons_city: f64,
    #[serde(rename = "consHWY_kWh/100km")]
    pub cons_highway: f64,
    /// Consumption surcharge in percent at 35 °C and above.
    #[serde(rename = "extraCons35Deg_perc")]
    pub extra_cons_hot: f64,
    /// Consumption surcharge in percent at −6 °C and below.
    #[serde(rename = "extraCons-6Deg_perc")]
    pub extra_cons_cold: f64,
    /// On-board charger limit.
    #[serde(rename = "pMax_kW", default)]
    pub p_max_kw: Option<f64>,
}

/// Charging availability for one scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvseScenario {
    /// Private charging groups: each vehicle belongs to exactly one.
    pub privat: Vec<PrivateGroup>,
    pub public: PublicCharging,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivateGroup {
    pub share: f64,
    /// Charger power at home, kW.
    pub home: f64,
    /// Charger power at work, kW.
    pub work: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicCharging {
    /// Probability of finding any public charger.
    pub prob: f64,
    pub slow: ChargerClass,
    pub fast: ChargerClass,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargerClass {
    pub share: f64,
    pub power: f64,
}

impl RunConfig {
    pub fn scenario(&self, name: &str) -> Result<&EvseScenario> {
        self.scenarios.get(name).ok_or_else(|| {
            anyhow!(
                "unknown scenario '{}'; available: {}",
                name,
                self.scenarios.keys().cloned().collect::<Vec<_>>().join(", ")
            )
        })
    }

    /// Battery physics for the optimizer, with Δt taken from `grid`.
    pub fn schedule_params(&self, grid: &TimeGrid) -> ScheduleParams {
        ScheduleParams::for_grid(self.charging_efficiency, self.soc_start, grid)
    }

    /// Segment ends for the configured horizon; `None` for `full`.
    pub fn segments(&self, grid: &TimeGrid) -> Option<SegmentBoundaries> {
        match self.horizon {
            Horizon::Full => None,
            horizon => Some(plan_boundaries(grid, horizon)),
        }
    }

    /// Reject inconsistent settings before any optimization work starts.
    pub fn validate(&self) -> Result<()> {
        if !(self.charging_efficiency > 0.0 && self.charging_efficiency <= 1.0) {
            return Err(anyhow!(
                "chargingEfficiency must be in (0, 1], got {}",
                self.charging_efficiency
            ));
        }
        if !(0.0..=1.0).contains(&self.soc_start) {
            return Err(anyhow!("SOCStart must be in [0, 1], got {}", self.soc_start));
        }
        if !(self.fleetsize.is_finite() && self.fleetsize >= 0.0) {
            return Err(anyhow!("fleetsize must be non-negative, got {}", self.fleetsize));
        }
        for (name, value) in [
            ("sensiAdjFS", self.sensi_adj_fleetsize),
            ("sensiAdjCap", self.sensi_adj_capacity),
            ("sensiAdjCons", self.sensi_adj_consumption),
            ("sensiAdjP", self.sensi_adj_power),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(anyhow!("{name} must be non-negative, got {value}"));
            }
        }

        if self.ev_models.is_empty() {
            return Err(anyhow!("eVModels must declare at least one model"));
        }
        for (name, model) in &self.ev_models {
            if !(model.capacity_kwh > 0.0) {
                return Err(anyhow!("model '{name}': capacity_kWh must be positive"));
            }
            if model.share < 0.0 {
                return Err(anyhow!("model '{name}': negative share"));
            }
        }
        check_shares("eVModels", self.ev_models.values().map(|m| m.share))?;

        for (name, scenario) in &self.scenarios {
            scenario
                .validate()
                .with_context(|| format!("validating scenario '{name}'"))?;
        }
        Ok(())
    }
}

impl EvseScenario {
    pub fn validate(&self) -> Result<()> {
        if self.privat.is_empty() {
            return Err(anyhow!("at least one private charging group is required"));
        }
        if self.privat.iter().any(|g| g.share < 0.0 || g.home < 0.0 || g.work < 0.0) {
            return Err(anyhow!("private group shares and powers must be non-negative"));
        }
        check_shares("privat", self.privat.iter().map(|g| g.share))?;

        let public = &self.public;
        if !(0.0..=1.0).contains(&public.prob) {
            return Err(anyhow!("public.prob must be in [0, 1], got {}", public.prob));
        }
        if public.slow.share < 0.0 || public.fast.share < 0.0 {
            return Err(anyhow!("public charger shares must be non-negative"));
        }
        if public.slow.power < 0.0 || public.fast.power < 0.0 {
            return Err(anyhow!("public charger powers must be non-negative"));
        }
        check_shares("public", [public.slow.share, public.fast.share].into_iter())
    }
}

fn check_shares(what: &str, shares: impl Iterator<Item = f64>) -> Result<()> {
    let total: f64 = shares.sum();
    if (total - 1.0).abs() > SHARE_TOLERANCE {
        return Err(anyhow!("{what} shares sum to {total}, expected 1"));
    }
    Ok(())
}

/// Load a run configuration from JSON or YAML and validate it.
pub fn load_config_from_path(path: &Path) -> Result<RunConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading run config '{}'", path.display()))?;
    let config: RunConfig = match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
            serde_yaml::from_str(&data).context("parsing run config yaml")?
        }
        Some(ext) if ext.eq_ignore_ascii_case("json") => {
            serde_json::from_str(&data).context("parsing run config json")?
        }
        _ => serde_yaml::from_str(&data)
            .or_else(|_| serde_json::from_str(&data))
            .context("parsing run config")?,
    };
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "horizon": "W",
        "chargingEfficiency": 0.9,
        "SOCStart": 0.5,
        "fleetsize": 1000,
        "eVModels": {
            "compact": {"share": 0.6, "capacity_kWh": 40, "consCITY_kWh/100km": 14,
                        "consHWY_kWh/100km": 20, "extraCons35Deg_perc": 12, "extraCons-6Deg_perc": 30},
            "suv": {"share": 0.4, "capacity_kWh": 80, "consCITY_kWh/100km": 20,
                    "consHWY_kWh/100km": 28, "extraCons35Deg_perc": 10, "extraCons-6Deg_perc": 25,
                    "pMax_kW": 7.4}
        },
        "scenarios": {
            "Realistic": {
                "privat": [{"share": 0.5, "home": 11, "work": 0},
                           {"share": 0.3, "home": 3.7, "work": 11},
                           {"share": 0.2, "home": 0, "work": 0}],
                "public": {"prob": 0.5, "slow": {"share": 0.8, "power": 22}, "fast": {"share": 0.2, "power": 50}}
            }
        }
    }"#;

    fn sample() -> RunConfig {
        serde_json::from_str(SAMPLE).unwrap()
    }

    #[test]
    fn parses_keys_and_defaults() {
        let config = sample();
        assert_eq!(config.horizon, Horizon::Week);
        assert_eq!(config.sensi_adj_power, 1.0);
        assert_eq!(config.ev_models["suv"].p_max_kw, Some(7.4));
        assert_eq!(config.ev_models["compact"].p_max_kw, None);
        assert_eq!(config.scenario("Realistic").unwrap().privat.len(), 3);
        config.validate().unwrap();
    }

    #[test]
    fn physics_and_horizon_reach_the_optimizer() {
        let start = chrono::NaiveDate::from_ymd_opt(2030, 1, 5)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        // Saturday to the following Wednesday: two ISO weeks.
        let grid = TimeGrid::new(start, start + chrono::Duration::days(5), 900).unwrap();
        let config = sample();

        let params = config.schedule_params(&grid);
        assert_eq!(params.efficiency, 0.9);
        assert_eq!(params.soc_start, 0.5);
        assert_eq!(params.delta_t, 0.25);

        let segments = config.segments(&grid).unwrap();
        assert_eq!(segments.as_slice(), &[2 * 96, 5 * 96]);

        let mut full = sample();
        full.horizon = Horizon::Full;
        assert!(full.segments(&grid).is_none());
    }

    #[test]
    fn unknown_horizon_fails_at_load() {
        let bad = SAMPLE.replace("\"W\"", "\"Q\"");
        let err = serde_json::from_str::<RunConfig>(&bad).unwrap_err();
        assert!(err.to_string().contains("Optimization horizon: Q unknown"));
    }

    #[test]
    fn shares_must_sum_to_one() {
        let mut config = sample();
        config.ev_models.get_mut("suv").unwrap().share = 0.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("eVModels shares"));

        let mut config = sample();
        config.scenarios.get_mut("Realistic").unwrap().public.fast.share = 0.3;
        let err = config.validate().unwrap_err();
        assert!(format!("{err:#}").contains("public shares"));
    }

    #[test]
    fn private_shares_below_one_are_rejected() {
        let mut config = sample();
        config.scenarios.get_mut("Realistic").unwrap().privat[2].share = 0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn out_of_range_physics_are_rejected() {
        let mut config = sample();
        config.charging_efficiency = 1.2;
        assert!(config.validate().is_err());

        let mut config = sample();
        config.soc_start = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_scenario_lists_available() {
        let err = sample().scenario("Optimistic").unwrap_err();
        assert!(err.to_string().contains("Realistic"));
    }
}
