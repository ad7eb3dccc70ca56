//! Deterministic fleet composition and charger availability.

use crate::config::{EvseScenario, SHARE_TOLERANCE};
use anyhow::{anyhow, Context, Result};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Where a vehicle is parked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Home,
    Work,
    Public,
}

impl Location {
    /// Location reached by a trip with the given purpose code.
    ///
    /// `0` is work, `7` and `8` are home, every other purpose ends at a
    /// public location.
    pub fn from_purpose(purpose: u8) -> Self {
        match purpose {
            0 => Location::Work,
            7 | 8 => Location::Home,
            _ => Location::Public,
        }
    }
}

/// Distribute `n` vehicles over models by share.
///
/// Every model first gets `floor(n·share)` vehicles; the remainder goes one
/// at a time to the model furthest below its exact quota. The result is
/// grouped by model in the order given.
pub fn ev_model_assignment(n: usize, shares: &[f64], names: &[String]) -> Result<Vec<String>> {
    if shares.len() != names.len() {
        return Err(anyhow!(
            "{} model shares for {} model names",
            shares.len(),
            names.len()
        ));
    }
    if n > 0 && shares.is_empty() {
        return Err(anyhow!("cannot assign {n} vehicles without any model"));
    }

    let quota: Vec<f64> = shares.iter().map(|share| n as f64 * share).collect();
    let mut counts: Vec<usize> = quota.iter().map(|q| q.floor().max(0.0) as usize).collect();
    while counts.iter().sum::<usize>() < n {
        let mut best = 0;
        for idx in 1..counts.len() {
            if counts[idx] as f64 - quota[idx] < counts[best] as f64 - quota[best] {
                best = idx;
            }
        }
        counts[best] += 1;
    }

    let mut assignment = Vec::with_capacity(n);
    for (name, count) in names.iter().zip(counts) {
        assignment.extend(std::iter::repeat(name.clone()).take(count));
    }
    assignment.truncate(n);
    Ok(assignment)
}

/// Spread `n` vehicles over private charging groups so every group is
/// evenly interleaved.
///
/// Group `k` takes every `1/x`-th of the still unassigned slots, where `x`
/// is its share relative to what is left; the last group takes the rest.
/// `n = 10` with shares `[0.5, 0.3, 0.2]` gives `[0, 1, 0, 2, 0, 1, 0, 2, 0, 1]`.
pub fn evse_group_assignment(n: usize, shares: &[f64]) -> Result<Vec<usize>> {
    let total: f64 = shares.iter().sum();
    if shares.is_empty() || (total - 1.0).abs() > SHARE_TOLERANCE {
        return Err(anyhow!("EVSE group shares sum to {total}, expected 1"));
    }
    let last = shares.len() - 1;

    let mut remaining = n;
    let mut taken_share = 0.0;
    let mut slots: Vec<VecDeque<bool>> = Vec::with_capacity(shares.len());
    for &share in &shares[..last] {
        let left = 1.0 - taken_share;
        let x = if left > 0.0 { share / left } else { 0.0 };
        let column: VecDeque<bool> = if x > 0.0 {
            let stride = 1.0 / x;
            (0..remaining).map(|j| (j as f64 % stride) < 1.0).collect()
        } else {
            std::iter::repeat(false).take(remaining).collect()
        };
        remaining -= column.iter().filter(|hit| **hit).count();
        taken_share += share;
        slots.push(column);
    }
    slots.push(std::iter::repeat(true).take(remaining).collect());

    let mut groups = vec![last; n];
    for group in groups.iter_mut() {
        for (idx, column) in slots.iter_mut().enumerate() {
            if column.pop_front() == Some(true) {
                *group = idx;
                break;
            }
        }
    }
    Ok(groups)
}

/// Charger power available at a location, in kW.
///
/// Private locations use the vehicle's group. At public locations a charger
/// is drawn from `[none, slow, fast]` with weights
/// `[1 − prob, prob·slow.share, prob·fast.share]`. The result is capped by
/// the vehicle's own limit if given.
pub fn charge_power(
    location: Location,
    scenario: &EvseScenario,
    group: usize,
    pmax_ev: Option<f64>,
    rng: &mut StdRng,
) -> Result<f64> {
    let power = match location {
        Location::Public => {
            let public = &scenario.public;
            let weights = [
                1.0 - public.prob,
                public.prob * public.slow.share,
                public.prob * public.fast.share,
            ];
            let total: f64 = weights.iter().sum();
            if (total - 1.0).abs() > SHARE_TOLERANCE {
                return Err(anyhow!("public charging probabilities sum to {total}, expected 1"));
            }
            let rates = [0.0, public.slow.power, public.fast.power];
            let dist = WeightedIndex::new(weights).context("building public charger distribution")?;
            rates[dist.sample(rng)]
        }
        Location::Home | Location::Work => {
            let private = scenario
                .privat
                .get(group)
                .ok_or_else(|| anyhow!("EVSE group {group} not in scenario"))?;
            if location == Location::Home {
                private.home
            } else {
                private.work
            }
        }
    };
    Ok(match pmax_ev {
        Some(limit) => power.min(limit),
        None => power,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChargerClass, PrivateGroup, PublicCharging};
    use rand::SeedableRng;

    fn scenario(prob: f64) -> EvseScenario {
        EvseScenario {
            privat: vec![
                PrivateGroup {
                    share: 0.7,
                    home: 11.0,
                    work: 3.7,
                },
                PrivateGroup {
                    share: 0.3,
                    home: 0.0,
                    work: 22.0,
                },
            ],
            public: PublicCharging {
                prob,
                slow: ChargerClass {
                    share: 0.75,
                    power: 22.0,
                },
                fast: ChargerClass {
                    share: 0.25,
                    power: 50.0,
                },
            },
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn purposes_map_to_locations() {
        assert_eq!(Location::from_purpose(0), Location::Work);
        assert_eq!(Location::from_purpose(7), Location::Home);
        assert_eq!(Location::from_purpose(8), Location::Home);
        assert_eq!(Location::from_purpose(3), Location::Public);
        assert_eq!(Location::from_purpose(9), Location::Public);
    }

    #[test]
    fn evse_groups_interleave() {
        let groups = evse_group_assignment(10, &[0.5, 0.3, 0.2]).unwrap();
        assert_eq!(groups, vec![0, 1, 0, 2, 0, 1, 0, 2, 0, 1]);
    }

    #[test]
    fn evse_group_counts_follow_shares() {
        let groups = evse_group_assignment(100, &[0.25, 0.25, 0.5]).unwrap();
        let count = |g| groups.iter().filter(|x| **x == g).count();
        assert_eq!(count(0), 25);
        assert_eq!(count(1), 25);
        assert_eq!(count(2), 50);
    }

    #[test]
    fn zero_share_group_gets_no_vehicle() {
        let groups = evse_group_assignment(6, &[0.0, 0.5, 0.5]).unwrap();
        assert!(!groups.contains(&0));
        assert_eq!(groups.len(), 6);
    }

    #[test]
    fn evse_shares_must_sum_to_one() {
        assert!(evse_group_assignment(10, &[0.5, 0.6]).is_err());
        assert!(evse_group_assignment(10, &[0.5, 0.4]).is_err());
        assert!(evse_group_assignment(10, &[]).is_err());
    }

    #[test]
    fn models_fill_remainder_by_largest_gap() {
        // Quotas 3.4 / 3.3 / 3.3: floors give 9, the first model is furthest
        // below its quota.
        let models = ev_model_assignment(10, &[0.34, 0.33, 0.33], &names(&["a", "b", "c"])).unwrap();
        assert_eq!(models.iter().filter(|m| *m == "a").count(), 4);
        assert_eq!(models.iter().filter(|m| *m == "b").count(), 3);
        assert_eq!(models.len(), 10);
        assert_eq!(models[0], "a");
        assert_eq!(models[9], "c");
    }

    #[test]
    fn model_assignment_rejects_mismatched_inputs() {
        assert!(ev_model_assignment(3, &[1.0], &names(&["a", "b"])).is_err());
        assert!(ev_model_assignment(3, &[], &[]).is_err());
        assert!(ev_model_assignment(0, &[], &[]).unwrap().is_empty());
    }

    #[test]
    fn private_power_depends_on_group_and_location() {
        let mut rng = StdRng::seed_from_u64(123);
        let s = scenario(0.5);
        assert_eq!(charge_power(Location::Home, &s, 0, None, &mut rng).unwrap(), 11.0);
        assert_eq!(charge_power(Location::Work, &s, 1, None, &mut rng).unwrap(), 22.0);
        assert_eq!(charge_power(Location::Work, &s, 1, Some(7.4), &mut rng).unwrap(), 7.4);
        assert!(charge_power(Location::Home, &s, 5, None, &mut rng).is_err());
    }

    #[test]
    fn public_draws_are_reproducible_with_seed() {
        let s = scenario(0.5);
        let draw = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..50)
                .map(|_| charge_power(Location::Public, &s, 0, None, &mut rng).unwrap())
                .collect::<Vec<_>>()
        };
        let first = draw(123);
        assert_eq!(first, draw(123));
        assert!(first.iter().all(|p| [0.0, 22.0, 50.0].contains(p)));
    }

    #[test]
    fn public_without_chargers_always_zero() {
        let s = scenario(0.0);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            assert_eq!(charge_power(Location::Public, &s, 0, None, &mut rng).unwrap(), 0.0);
        }
    }
}
