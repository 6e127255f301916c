//! # Adaptive Randomization
//!
//! Response-free adaptive allocation: after a simple-randomization burn-in of
//! `2 × arm count` participants, arms lagging furthest behind their target
//! share are favoured.

use super::simple::{no_arms, simple_assign, weighted_index};
use crate::domain::{ArmId, BlindingResult, Study};
use rand::Rng;

/// Floor applied to every gap so that no arm becomes unreachable.
pub const MIN_ADAPTIVE_WEIGHT: f64 = 0.1;

/// Arms ranked by `target share - current share`, largest gap first.
///
/// Current shares are taken over active participants only. Equal gaps keep
/// arm definition order.
pub fn ranked_gaps(study: &Study) -> Vec<(usize, f64)> {
    let weights = study.randomization.weights(study.arms.len());
    let weight_total: f64 = weights.iter().sum();
    let counts = study.active_counts();
    let active_total: usize = counts.iter().sum();

    let mut gaps: Vec<(usize, f64)> = weights
        .iter()
        .zip(&counts)
        .enumerate()
        .map(|(index, (weight, count))| {
            let target = weight / weight_total;
            let current = if active_total == 0 {
                0.0
            } else {
                *count as f64 / active_total as f64
            };
            (index, target - current)
        })
        .collect();

    gaps.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    gaps
}

/// Assign adaptively.
pub fn adaptive_assign<R: Rng + ?Sized>(study: &Study, rng: &mut R) -> BlindingResult<ArmId> {
    if study.participants.len() < 2 * study.arms.len() {
        return simple_assign(study, rng);
    }

    let ranked = ranked_gaps(study);
    let first = ranked.first().ok_or_else(|| no_arms(study))?.0;
    let weights: Vec<f64> = ranked
        .iter()
        .map(|(_, gap)| gap.max(MIN_ADAPTIVE_WEIGHT))
        .collect();

    let index = weighted_index(&weights, rng)
        .map(|i| ranked[i].0)
        .unwrap_or(first);
    Ok(study.arms[index].id.clone())
}
