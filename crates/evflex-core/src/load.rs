//! Load curves: the dense residual load and sparse per-agent charging demand.

use crate::{AgentId, EvError, EvResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Non-EV demand per time step in MW.
///
/// The orchestrator owns the only mutable copy; workers receive a read-only
/// [`snapshot`](ResidualLoad::snapshot) and send back their demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidualLoad(Vec<f64>);

impl ResidualLoad {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn zeros(n_steps: usize) -> Self {
        Self(vec![0.0; n_steps])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn get(&self, step: usize) -> Option<f64> {
        self.0.get(step).copied()
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }

    /// Immutable copy handed to a worker.
    pub fn snapshot(&self) -> Arc<[f64]> {
        Arc::from(self.0.as_slice())
    }

    /// Add committed charging power on top of the residual curve.
    pub fn add_demand(&mut self, demand: &Demand) -> EvResult<()> {
        let len = self.0.len();
        for (step, power) in demand.iter() {
            let slot = self.0.get_mut(step).ok_or_else(|| {
                EvError::Validation(format!(
                    "demand at step {step} is outside the residual load ({len} steps)"
                ))
            })?;
            *slot += power;
        }
        Ok(())
    }

    /// Element-wise sum, used to build the national curve from regional ones.
    pub fn accumulate(&mut self, other: &ResidualLoad) -> EvResult<()> {
        if other.len() != self.len() {
            return Err(EvError::Validation(format!(
                "residual load length mismatch: {} vs {}",
                self.len(),
                other.len()
            )));
        }
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a += b;
        }
        Ok(())
    }
}

impl From<Vec<f64>> for ResidualLoad {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

impl From<&[f64]> for ResidualLoad {
    fn from(values: &[f64]) -> Self {
        Self(values.to_vec())
    }
}

/// Sparse charging power of one agent: step → MW, zero entries omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Demand(BTreeMap<usize, f64>);

impl Demand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add power at a step; non-positive values are dropped.
    pub fn add(&mut self, step: usize, power: f64) {
        if power > 0.0 {
            *self.0.entry(step).or_insert(0.0) += power;
        }
    }

    pub fn get(&self, step: usize) -> f64 {
        self.0.get(&step).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.0.iter().map(|(&step, &power)| (step, power))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn extend(&mut self, other: &Demand) {
        for (step, power) in other.iter() {
            self.add(step, power);
        }
    }

    /// Sum of power over all steps (multiply by Δt for energy).
    pub fn total_power(&self) -> f64 {
        self.0.values().sum()
    }
}

impl FromIterator<(usize, f64)> for Demand {
    fn from_iter<I: IntoIterator<Item = (usize, f64)>>(iter: I) -> Self {
        let mut demand = Demand::new();
        for (step, power) in iter {
            demand.add(step, power);
        }
        demand
    }
}

pub type DemandMap = BTreeMap<AgentId, Demand>;
pub type SlackMap = BTreeMap<AgentId, f64>;
