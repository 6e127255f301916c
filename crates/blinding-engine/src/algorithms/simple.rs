//! # Simple Randomization
//!
//! Weighted uniform draw over the allocation ratio (equal weights by default).

use crate::domain::{ArmId, BlindingError, BlindingResult, Study};
use rand::Rng;

/// Pick an index by cumulative weight.
///
/// Falls back to the last index when rounding leaves nothing selected.
/// Returns `None` for an empty or all-zero weight list.
pub fn weighted_index<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> Option<usize> {
    let total: f64 = weights.iter().sum();
    if weights.is_empty() || total <= 0.0 || !total.is_finite() {
        return None;
    }

    let draw = rng.gen::<f64>();
    let mut cumulative = 0.0;
    for (index, weight) in weights.iter().enumerate() {
        cumulative += weight / total;
        if draw < cumulative {
            return Some(index);
        }
    }

    Some(weights.len() - 1)
}

/// Assign by simple randomization.
pub fn simple_assign<R: Rng + ?Sized>(study: &Study, rng: &mut R) -> BlindingResult<ArmId> {
    let weights = study.randomization.weights(study.arms.len());
    let index = weighted_index(&weights, rng).ok_or_else(|| no_arms(study))?;
    Ok(study.arms[index].id.clone())
}

pub(crate) fn no_arms(study: &Study) -> BlindingError {
    BlindingError::invalid_operation(&study.id, "study has no arms to assign")
}
