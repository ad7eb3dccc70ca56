//! Agents and their parking/driving events.
//!
//! Units follow the optimizer convention: power in MW, energy in MWh, time
//! as integer step indices on a [`TimeGrid`](crate::TimeGrid).

use crate::{EvError, EvResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// One parking interval of a vehicle.
///
/// `consumption` is the driving energy used on the trip that follows the
/// interval; `p_max` is the charge power available while parked. Events are
/// immutable: splitting at segment boundaries goes through the `with_*`
/// copy constructors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEvent")]
pub struct Event {
    start: usize,
    stop: usize,
    consumption: f64,
    p_max: f64,
    purpose: u8,
}

/// Unchecked wire form of [`Event`].
#[derive(Deserialize)]
struct RawEvent {
    start: usize,
    stop: usize,
    consumption: f64,
    p_max: f64,
    purpose: u8,
}

impl TryFrom<RawEvent> for Event {
    type Error = EvError;

    fn try_from(raw: RawEvent) -> EvResult<Self> {
        Event::new(raw.start, raw.stop, raw.consumption, raw.p_max, raw.purpose)
    }
}

impl Event {
    pub fn new(start: usize, stop: usize, consumption: f64, p_max: f64, purpose: u8) -> EvResult<Self> {
        if start >= stop {
            return Err(EvError::Validation(format!(
                "event start {start} must be before stop {stop}"
            )));
        }
        if !(consumption.is_finite() && consumption >= 0.0) {
            return Err(EvError::Validation(format!(
                "event [{start}, {stop}) has invalid consumption {consumption}"
            )));
        }
        if !(p_max.is_finite() && p_max >= 0.0) {
            return Err(EvError::Validation(format!(
                "event [{start}, {stop}) has invalid charge power {p_max}"
            )));
        }
        Ok(Self {
            start,
            stop,
            consumption,
            p_max,
            purpose,
        })
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn stop(&self) -> usize {
        self.stop
    }

    pub fn consumption(&self) -> f64 {
        self.consumption
    }

    pub fn p_max(&self) -> f64 {
        self.p_max
    }

    pub fn purpose(&self) -> u8 {
        self.purpose
    }

    /// Number of time steps in the window. Zero for a degenerate split piece.
    pub fn duration(&self) -> usize {
        self.stop.saturating_sub(self.start)
    }

    /// Time steps at which the vehicle may charge.
    pub fn steps(&self) -> Range<usize> {
        self.start..self.stop.max(self.start)
    }

    /// Copy of this event starting at `start`.
    pub fn with_start(&self, start: usize) -> Self {
        Self { start, ..*self }
    }

    /// Copy of this event ending at `stop`.
    pub fn with_stop(&self, stop: usize) -> Self {
        Self { stop, ..*self }
    }

    /// Copy of this event with a different trip consumption.
    pub fn with_consumption(&self, consumption: f64) -> Self {
        Self {
            consumption,
            ..*self
        }
    }
}

/// Stable agent identifier, `<region>_<vehicle>` for preprocessed fleets.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for AgentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A simulated electric vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    /// Vehicle model name from the configuration.
    pub model: String,
    /// Time-ordered, non-overlapping parking events inside the horizon.
    pub events: Vec<Event>,
    /// Battery capacity in MWh (already scaled by the aggregation factor).
    pub capacity: f64,
    pub evse_group: usize,
    pub region_id: String,
    /// Number of real vehicles this agent stands for.
    pub agg_fac: f64,
}

impl Agent {
    /// Check that the events are ordered, do not overlap and end inside
    /// `[0, horizon)`. Gaps between events are driving time.
    pub fn validate(&self, horizon: usize) -> EvResult<()> {
        if !(self.capacity.is_finite() && self.capacity > 0.0) {
            return Err(EvError::Validation(format!(
                "agent {} has non-positive capacity {}",
                self.id, self.capacity
            )));
        }
        let mut previous_stop = 0;
        for event in &self.events {
            if event.start() < previous_stop {
                return Err(EvError::Validation(format!(
                    "agent {}: event [{}, {}) overlaps the previous event ending at step {}",
                    self.id,
                    event.start(),
                    event.stop(),
                    previous_stop
                )));
            }
            previous_stop = event.stop();
        }
        if previous_stop > horizon {
            return Err(EvError::Validation(format!(
                "agent {}: events end at step {previous_stop}, horizon is {horizon}",
                self.id
            )));
        }
        Ok(())
    }

    /// Energy content at the start of the horizon for a given state of charge.
    pub fn start_energy(&self, soc_start: f64) -> f64 {
        soc_start * self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent_with(events: Vec<Event>) -> Agent {
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
    fn event_rejects_empty_window() {
        assert!(Event::new(5, 5, 0.0, 1.0, 7).is_err());
        assert!(Event::new(6, 5, 0.0, 1.0, 7).is_err());
    }

    #[test]
    fn event_rejects_negative_power() {
        assert!(Event::new(0, 4, 1.0, -0.5, 7).is_err());
    }

    #[test]
    fn copy_constructors_leave_original_untouched() {
        let event = Event::new(90, 150, 5.0, 2.0, 1).unwrap();
        let head = event.with_stop(100).with_consumption(0.0);
        let tail = event.with_start(101);

        assert_eq!((head.start(), head.stop(), head.consumption()), (90, 100, 0.0));
        assert_eq!((tail.start(), tail.stop(), tail.consumption()), (101, 150, 5.0));
        assert_eq!((event.start(), event.stop(), event.consumption()), (90, 150, 5.0));
        assert_eq!(head.p_max(), 2.0);
        assert_eq!(tail.purpose(), 1);
    }

    #[test]
    fn degenerate_piece_has_no_steps() {
        let event = Event::new(90, 101, 1.0, 2.0, 1).unwrap().with_start(101);
        assert_eq!(event.duration(), 0);
        assert_eq!(event.steps().count(), 0);
    }

    #[test]
    fn validate_accepts_cover_with_driving_gaps() {
        let agent = agent_with(vec![
            Event::new(0, 4, 1.0, 2.0, 7).unwrap(),
            Event::new(4, 6, 0.0, 2.0, 0).unwrap(),
            Event::new(7, 10, 0.0, 2.0, 7).unwrap(),
        ]);
        assert!(agent.validate(10).is_ok());
    }

    #[test]
    fn validate_rejects_overlap_and_overrun() {
        let overlap = agent_with(vec![
            Event::new(0, 5, 1.0, 2.0, 7).unwrap(),
            Event::new(4, 10, 0.0, 2.0, 0).unwrap(),
        ]);
        assert!(overlap.validate(10).is_err());

        let overrun = agent_with(vec![Event::new(0, 12, 1.0, 2.0, 7).unwrap()]);
        assert!(overrun.validate(10).is_err());

        let mut empty_battery = agent_with(Vec::new());
        empty_battery.capacity = 0.0;
        assert!(empty_battery.validate(10).is_err());
    }

    #[test]
    fn deserialized_events_are_checked() {
        let event = Event::new(4, 8, 1.5, 2.0, 0).unwrap();
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(serde_json::from_str::<Event>(&json).unwrap(), event);

        let reversed = r#"{"start":8,"stop":4,"consumption":1.0,"p_max":2.0,"purpose":7}"#;
        let err = serde_json::from_str::<Event>(reversed).unwrap_err();
        assert!(err.to_string().contains("event start 8 must be before stop 4"));

        let negative = r#"{"start":0,"stop":4,"consumption":-1.0,"p_max":2.0,"purpose":7}"#;
        assert!(serde_json::from_str::<Event>(negative).is_err());
    }

    #[test]
    fn agent_id_serializes_as_plain_string() {
        let id = AgentId::new("r1_07");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"r1_07\"");
    }
}
