//! Simulation time grid, optimization horizon codes and segment boundaries.
//!
//! All optimizer data is indexed by integer steps on a fixed grid. The
//! default grid is one calendar year (2030) at 15-minute resolution, so
//! `Δt = 0.25 h` and the horizon has 35 040 steps.

use crate::{EvError, EvResult};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fixed-resolution time axis `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeGrid {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub resolution_secs: i64,
}

impl TimeGrid {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime, resolution_secs: i64) -> EvResult<Self> {
        if resolution_secs <= 0 {
            return Err(EvError::Config(format!(
                "time resolution must be positive, got {resolution_secs} s"
            )));
        }
        if end <= start {
            return Err(EvError::Config(format!(
                "time grid end {end} must be after start {start}"
            )));
        }
        Ok(Self {
            start,
            end,
            resolution_secs,
        })
    }

    /// Calendar year 2030 at 15-minute resolution.
    pub fn year_2030() -> Self {
        let start = NaiveDate::from_ymd_opt(2030, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap_or_default();
        let end = NaiveDate::from_ymd_opt(2031, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap_or_default();
        Self {
            start,
            end,
            resolution_secs: 15 * 60,
        }
    }

    pub fn n_steps(&self) -> usize {
        ((self.end - self.start).num_seconds() / self.resolution_secs).max(0) as usize
    }

    /// Step length in hours (Δt).
    pub fn delta_hours(&self) -> f64 {
        self.resolution_secs as f64 / 3600.0
    }

    /// Nearest step index of a timestamp; negative before the grid start.
    pub fn index_of(&self, ts: NaiveDateTime) -> i64 {
        let secs = (ts - self.start).num_seconds() as f64;
        (secs / self.resolution_secs as f64).round() as i64
    }

    pub fn timestamp(&self, step: usize) -> NaiveDateTime {
        self.start + Duration::seconds(self.resolution_secs * step as i64)
    }

    pub fn timestamps(&self) -> impl Iterator<Item = NaiveDateTime> + '_ {
        (0..self.n_steps()).map(move |step| self.timestamp(step))
    }
}

impl Default for TimeGrid {
    fn default() -> Self {
        Self::year_2030()
    }
}

/// Length of one optimization sub-problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Horizon {
    /// One program over the whole grid.
    #[serde(rename = "full")]
    Full,
    #[serde(rename = "D")]
    Day,
    /// ISO calendar week.
    #[serde(rename = "W")]
    Week,
    #[serde(rename = "M")]
    Month,
}

impl Horizon {
    pub fn code(&self) -> &'static str {
        match self {
            Horizon::Full => "full",
            Horizon::Day => "D",
            Horizon::Week => "W",
            Horizon::Month => "M",
        }
    }
}

impl FromStr for Horizon {
    type Err = EvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(Horizon::Full),
            "D" => Ok(Horizon::Day),
            "W" => Ok(Horizon::Week),
            "M" => Ok(Horizon::Month),
            other => Err(EvError::Config(format!(
                "Optimization horizon: {other} unknown"
            ))),
        }
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Ascending exclusive segment ends; the last one equals the horizon length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentBoundaries(Vec<usize>);

impl SegmentBoundaries {
    pub fn new(ends: Vec<usize>) -> EvResult<Self> {
        if ends.is_empty() {
            return Err(EvError::Validation(
                "segment boundaries must not be empty".into(),
            ));
        }
        if ends.windows(2).any(|w| w[0] >= w[1]) {
            return Err(EvError::Validation(format!(
                "segment boundaries must be strictly ascending: {ends:?}"
            )));
        }
        if ends[0] == 0 {
            return Err(EvError::Validation(
                "first segment boundary must be positive".into(),
            ));
        }
        Ok(Self(ends))
    }

    /// A single segment covering `[0, horizon)`.
    pub fn single(horizon: usize) -> Self {
        Self(vec![horizon])
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn horizon(&self) -> usize {
        self.0.last().copied().unwrap_or(0)
    }
}
