//! # Stratified Randomization
//!
//! Participants are grouped by the values of the stratification factors.
//! Within a stratum the arm with the fewest assignments wins (random among
//! ties), so per-arm counts never drift apart by more than one.

use super::simple::{no_arms, simple_assign};
use super::ArmAssignment;
use crate::domain::{
    AggregateRecord, BlindingResult, ParticipantAttributes, StratumCounts, Study,
};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;

/// Value used for a factor the participant has no attribute for.
pub const UNKNOWN_FACTOR_VALUE: &str = "unknown";

/// Stratum key: factor values in configured order, joined with `|`.
pub fn stratum_key(factors: &[String], attributes: &ParticipantAttributes) -> String {
    factors
        .iter()
        .map(|f| {
            attributes
                .get(f)
                .map(String::as_str)
                .unwrap_or(UNKNOWN_FACTOR_VALUE)
        })
        .collect::<Vec<_>>()
        .join("|")
}

/// Assign within the participant's stratum.
///
/// `stored` holds the stratum's counts, absent for its first participant.
pub fn stratified_assign<R: Rng + ?Sized>(
    study: &Study,
    attributes: &ParticipantAttributes,
    stored: Option<&StratumCounts>,
    rng: &mut R,
) -> BlindingResult<ArmAssignment> {
    let stratum_id = stratum_key(&study.randomization.stratification_factors, attributes);

    let mut counts: BTreeMap<_, u64> = study
        .arms
        .iter()
        .map(|arm| {
            let count = stored
                .and_then(|s| s.counts.get(&arm.id))
                .copied()
                .unwrap_or(0);
            (arm.id.clone(), count)
        })
        .collect();

    let arm_id = match stored {
        None => simple_assign(study, rng)?,
        Some(_) => {
            let min = counts.values().min().copied().ok_or_else(|| no_arms(study))?;
            let tied: Vec<_> = study
                .arms
                .iter()
                .filter(|arm| counts.get(&arm.id) == Some(&min))
                .map(|arm| arm.id.clone())
                .collect();
            tied.choose(rng).cloned().ok_or_else(|| no_arms(study))?
        }
    };

    *counts.entry(arm_id.clone()).or_insert(0) += 1;

    Ok(ArmAssignment {
        arm_id,
        record: Some(AggregateRecord::StratumCounts(StratumCounts {
            study_id: study.id.clone(),
            stratum_id,
            counts,
        })),
    })
}
