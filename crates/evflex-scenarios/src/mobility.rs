//! Mobility diaries to parking events.
//!
//! Each vehicle's trips are turned into the parking intervals between them.
//! An event carries the charger power available while parked and the energy
//! of the trip that ends it. All optimizer quantities are in MW / MWh,
//! scaled by the number of real vehicles an agent stands for.

use crate::config::{EvModel, EvseScenario, RunConfig};
use crate::fleet::{charge_power, ev_model_assignment, evse_group_assignment, Location};
use anyhow::{anyhow, Context, Result};
use chrono::NaiveDateTime;
use csv::ReaderBuilder;
use evflex_core::{Agent, AgentId, Event, TimeGrid};
use rand::rngs::StdRng;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Purpose code of the implicit stay before the first trip (home).
const START_PURPOSE: u8 = 7;

/// One diary row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    #[serde(rename = "Departure", deserialize_with = "deserialize_timestamp")]
    pub departure: NaiveDateTime,
    #[serde(rename = "Arrival", deserialize_with = "deserialize_timestamp")]
    pub arrival: NaiveDateTime,
    /// Purpose of the trip, i.e. where it ends.
    #[serde(rename = "Purpose")]
    pub purpose: u8,
    #[serde(rename = "Vehicle_id")]
    pub vehicle_id: u32,
    #[serde(rename = "MeanSpeed [km/h]")]
    pub mean_speed: f64,
    #[serde(rename = "Temperature [deg_C]")]
    pub temperature: f64,
    #[serde(rename = "Distance [km]")]
    pub distance: f64,
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    parse_timestamp(&value).map_err(serde::de::Error::custom)
}

/// Accepts `2030-01-01 07:15:00`, `2030-01-01T07:15:00` and minute precision.
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime> {
    let value = value.trim();
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .ok_or_else(|| anyhow!("unrecognized timestamp '{value}'"))
}

/// Read a `;`-separated trip diary.
pub fn read_trips(path: &Path) -> Result<Vec<Trip>> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("opening trip diary '{}'", path.display()))?;
    let mut trips = Vec::new();
    for result in rdr.deserialize() {
        let trip: Trip = result.context("parsing trip diary record")?;
        trips.push(trip);
    }
    Ok(trips)
}

/// Trip energy in kWh.
///
/// Base consumption is the city value below 34 km/h, the highway value
/// above 78 km/h and linear in between. The temperature surcharge grows
/// linearly from 23 °C up to the 35 °C value and down to the −6 °C value,
/// and stays constant beyond those.
pub fn consumption_kwh(mean_speed: f64, temperature: f64, distance: f64, model: &EvModel) -> f64 {
    const CITY_SPEED: f64 = 34.0;
    const HIGHWAY_SPEED: f64 = 78.0;
    const NEUTRAL_TEMP: f64 = 23.0;
    const HOT_TEMP: f64 = 35.0;
    const COLD_TEMP: f64 = -6.0;

    let base = if mean_speed < CITY_SPEED {
        model.cons_city
    } else if mean_speed > HIGHWAY_SPEED {
        model.cons_highway
    } else {
        model.cons_city
            + (mean_speed - CITY_SPEED) * (model.cons_highway - model.cons_city)
                / (HIGHWAY_SPEED - CITY_SPEED)
    };

    let extra_percent = if temperature > HOT_TEMP {
        model.extra_cons_hot
    } else if temperature < COLD_TEMP {
        model.extra_cons_cold
    } else if temperature >= NEUTRAL_TEMP {
        (temperature - NEUTRAL_TEMP) * model.extra_cons_hot / (HOT_TEMP - NEUTRAL_TEMP)
    } else {
        (NEUTRAL_TEMP - temperature) * model.extra_cons_cold / (NEUTRAL_TEMP - COLD_TEMP)
    };

    base * (1.0 + extra_percent / 100.0) * distance / 100.0
}

/// Everything fixed for one vehicle while its events are built.
pub struct VehicleContext<'a> {
    pub scenario: &'a EvseScenario,
    pub evse_group: usize,
    /// Vehicle charger limit in kW.
    pub pmax_ev: Option<f64>,
    /// kWh/kW to MWh/MW times the aggregation factor.
    pub scale: f64,
    pub sensi_adj_consumption: f64,
    pub sensi_adj_power: f64,
}

/// Parking events of one vehicle inside `[0, n_steps)`; driving time lies
/// between consecutive events.
///
/// `trips` holds `(departure step, arrival step, purpose, consumption kWh)`
/// in time order. The first stay is at home. A trip departing at or before
/// the previous arrival has no parking in between: its consumption is added
/// to the preceding event (or, before the first event, to the next one) and
/// the vehicle's position moves on.
pub fn parking_events(
    trips: &[(usize, usize, u8, f64)],
    n_steps: usize,
    ctx: &VehicleContext<'_>,
    rng: &mut StdRng,
) -> Result<Vec<Event>> {
    let mut events = Vec::with_capacity(trips.len() + 1);
    let mut saved = 0.0;
    let mut last = 0;
    let mut location = Location::Home;
    let mut purpose = START_PURPOSE;

    for &(departure, arrival, trip_purpose, consumption) in trips {
        if departure > last {
            let power = charge_power(location, ctx.scenario, ctx.evse_group, ctx.pmax_ev, rng)?
                * ctx.sensi_adj_power;
            events.push(Event::new(
                last,
                departure,
                (consumption + saved) * ctx.scale * ctx.sensi_adj_consumption,
                power * ctx.scale,
                purpose,
            )?);
            saved = 0.0;
        } else {
            match events.last_mut() {
                Some(previous) => {
                    let added = consumption * ctx.scale * ctx.sensi_adj_consumption;
                    *previous = previous.with_consumption(previous.consumption() + added);
                }
                None => saved += consumption,
            }
        }
        last = last.max(arrival);
        location = Location::from_purpose(trip_purpose);
        purpose = trip_purpose;
    }

    if last < n_steps {
        let power = charge_power(location, ctx.scenario, ctx.evse_group, ctx.pmax_ev, rng)?
            * ctx.sensi_adj_power;
        events.push(Event::new(
            last,
            n_steps,
            saved * ctx.scale * ctx.sensi_adj_consumption,
            power * ctx.scale,
            purpose,
        )?);
    }
    Ok(events)
}

/// Build the agents of one region from its trip diary.
///
/// Vehicles are ordered by id; EVSE groups and models are assigned by that
/// position. Trips outside the grid are dropped. Agent ids are
/// `<region>_<vehicle:02>`.
pub fn build_agents(
    trips: &[Trip],
    config: &RunConfig,
    scenario_name: &str,
    region_id: &str,
    agg_fac: f64,
    grid: &TimeGrid,
    rng: &mut StdRng,
) -> Result<Vec<Agent>> {
    let scenario = config.scenario(scenario_name)?;
    let agg_fac = agg_fac * config.sensi_adj_fleetsize;
    let n_steps = grid.n_steps();

    let vehicle_ids: Vec<u32> = trips
        .iter()
        .map(|t| t.vehicle_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let group_shares: Vec<f64> = scenario.privat.iter().map(|g| g.share).collect();
    let groups = evse_group_assignment(vehicle_ids.len(), &group_shares)
        .with_context(|| format!("assigning EVSE groups in region {region_id}"))?;
    let model_names: Vec<String> = config.ev_models.keys().cloned().collect();
    let model_shares: Vec<f64> = config.ev_models.values().map(|m| m.share).collect();
    let models = ev_model_assignment(vehicle_ids.len(), &model_shares, &model_names)
        .with_context(|| format!("assigning vehicle models in region {region_id}"))?;

    let mut agents = Vec::with_capacity(vehicle_ids.len());
    for (position, vehicle_id) in vehicle_ids.iter().enumerate() {
        let model_name = &models[position];
        let model = config
            .ev_models
            .get(model_name)
            .ok_or_else(|| anyhow!("model '{model_name}' missing from config"))?;

        let mut steps: Vec<(usize, usize, u8, f64)> = trips
            .iter()
            .filter(|t| t.vehicle_id == *vehicle_id)
            .filter_map(|t| {
                let departure = grid.index_of(t.departure);
                let arrival = grid.index_of(t.arrival);
                if departure < 0 || arrival >= n_steps as i64 {
                    return None;
                }
                let consumption = consumption_kwh(t.mean_speed, t.temperature, t.distance, model);
                Some((departure as usize, arrival.max(0) as usize, t.purpose, consumption))
            })
            .collect();
        steps.sort_by_key(|&(departure, ..)| departure);

        let ctx = VehicleContext {
            scenario,
            evse_group: groups[position],
            pmax_ev: model.p_max_kw,
            scale: agg_fac / 1000.0,
            sensi_adj_consumption: config.sensi_adj_consumption,
            sensi_adj_power: config.sensi_adj_power,
        };
        let id = AgentId::new(format!("{region_id}_{vehicle_id:02}"));
        let events = parking_events(&steps, n_steps, &ctx, rng)
            .with_context(|| format!("building events for agent {id}"))?;

        let capacity_kwh = model.capacity_kwh * config.sensi_adj_capacity;
        let agent = Agent {
            id,
            model: model_name.clone(),
            events,
            capacity: capacity_kwh * agg_fac / 1000.0,
            evse_group: groups[position],
            region_id: region_id.to_string(),
            agg_fac,
        };
        agent.validate(n_steps)?;
        agents.push(agent);
    }
    Ok(agents)
}
