//! Load-flattening objective.
//!
//! The joint goal is `Σ_t (r_t + Σ_a p_{a,t})²`. Holding every other agent's
//! power at its committed value (already folded into `r_t`) and dropping
//! constants, one agent's share is `Σ_t [2·r_t·p_t + p_t²]`.

use crate::qp::{QpModel, VarId};
use std::collections::BTreeMap;

/// Add `Σ_t [2·r_t·p_t + p_t²]` over the given power variables.
///
/// Steps outside `residual` count as zero background load.
pub fn assemble_objective(model: &mut QpModel, power: &BTreeMap<usize, VarId>, residual: &[f64]) {
    for (&t, &p) in power {
        let r = residual.get(t).copied().unwrap_or(0.0);
        model.add_linear_cost(p, 2.0 * r);
        model.add_quadratic_cost(p, p, 1.0);
    }
}

/// Add `Σ_t [2·r_t·P_t + P_t²]` with `P_t = Σ_a p_{a,t}` for several agents
/// sharing one model.
pub fn assemble_joint_objective(
    model: &mut QpModel,
    powers: &[&BTreeMap<usize, VarId>],
    residual: &[f64],
) {
    let mut by_step: BTreeMap<usize, Vec<VarId>> = BTreeMap::new();
    for power in powers {
        for (&t, &p) in power.iter() {
            by_step.entry(t).or_default().push(p);
        }
    }

    for (t, vars) in by_step {
        let r = residual.get(t).copied().unwrap_or(0.0);
        for (i, &p) in vars.iter().enumerate() {
            model.add_linear_cost(p, 2.0 * r);
            model.add_quadratic_cost(p, p, 1.0);
            for &q in &vars[i + 1..] {
                model.add_quadratic_cost(p, q, 2.0);
            }
        }
    }
}
