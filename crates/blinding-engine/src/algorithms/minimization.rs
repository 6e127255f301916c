//! # Minimization
//!
//! Pocock-Simon style minimization. For every arm the engine sums, over the
//! weighted factors, the number of active participants in that arm sharing
//! the new participant's value. The lowest-scoring arm wins; ties are broken
//! uniformly, except that with probability [`TIE_RANDOMIZATION_PROBABILITY`]
//! the tie is resolved by plain simple randomization instead.

use super::simple::{no_arms, simple_assign};
use super::stratified::UNKNOWN_FACTOR_VALUE;
use crate::domain::{
    ArmId, BlindingResult, MinimizationFactor, ParticipantAttributes, ParticipantId, Study,
};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;

/// Chance of falling back to simple randomization on a tie.
pub const TIE_RANDOMIZATION_PROBABILITY: f64 = 0.2;

const SCORE_EPSILON: f64 = 1e-9;

fn factor_value<'a>(attributes: Option<&'a ParticipantAttributes>, factor: &str) -> &'a str {
    attributes
        .and_then(|a| a.get(factor))
        .map(String::as_str)
        .unwrap_or(UNKNOWN_FACTOR_VALUE)
}

/// Weighted imbalance score per arm, in arm order.
///
/// `population` maps enrolled participant ids to their attributes; missing
/// entries count as `unknown` for every factor.
pub fn imbalance_scores(
    study: &Study,
    factors: &[MinimizationFactor],
    attributes: &ParticipantAttributes,
    population: &HashMap<ParticipantId, ParticipantAttributes>,
) -> Vec<f64> {
    study
        .arms
        .iter()
        .map(|arm| {
            let members: Vec<_> = study
                .active_participants()
                .filter(|p| p.arm_id == arm.id)
                .map(|p| population.get(&p.participant_id))
                .collect();

            factors
                .iter()
                .map(|factor| {
                    let value = factor_value(Some(attributes), &factor.name);
                    let matching = members
                        .iter()
                        .filter(|m| factor_value(**m, &factor.name) == value)
                        .count();
                    factor.weight * matching as f64
                })
                .sum()
        })
        .collect()
}

/// Assign by minimization.
pub fn minimization_assign<R: Rng + ?Sized>(
    study: &Study,
    attributes: &ParticipantAttributes,
    population: &HashMap<ParticipantId, ParticipantAttributes>,
    rng: &mut R,
) -> BlindingResult<ArmId> {
    let factors = &study.randomization.minimization_factors;
    if factors.is_empty() {
        return simple_assign(study, rng);
    }

    let scores = imbalance_scores(study, factors, attributes, population);
    let min = scores
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min);

    let tied: Vec<&ArmId> = study
        .arms
        .iter()
        .zip(&scores)
        .filter(|(_, score)| (*score - min).abs() < SCORE_EPSILON)
        .map(|(arm, _)| &arm.id)
        .collect();

    match tied.as_slice() {
        [] => Err(no_arms(study)),
        [only] => Ok((*only).clone()),
        _ if rng.gen::<f64>() < TIE_RANDOMIZATION_PROBABILITY => simple_assign(study, rng),
        _ => tied
            .choose(rng)
            .map(|arm| (*arm).clone())
            .ok_or_else(|| no_arms(study)),
    }
}
