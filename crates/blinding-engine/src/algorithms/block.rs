//! # Block Randomization
//!
//! Permuted blocks. The participant's enrollment position picks the block
//! (`position / block_size`) and the slot within it (`position % block_size`).
//! Slot zero generates and stores a new shuffled block; later slots read the
//! stored block for the current block number.

use super::ArmAssignment;
use crate::domain::{
    AggregateRecord, ArmId, BlindingError, BlindingResult, BlockSequence, Study, Timestamp,
};
use rand::seq::SliceRandom;
use rand::Rng;

/// `(block_number, slot)` for the next enrollment.
pub fn block_position(study: &Study) -> (u64, usize) {
    let block_size = study.randomization.block_size_for(study.arms.len()).max(1);
    let position = study.participants.len();
    ((position / block_size) as u64, position % block_size)
}

/// Generate a shuffled block whose multiplicities follow the allocation ratio.
pub fn generate_block<R: Rng + ?Sized>(
    study: &Study,
    block_number: u64,
    now: Timestamp,
    rng: &mut R,
) -> BlockSequence {
    let multiplicities = study.randomization.block_multiplicities(study.arms.len());
    let mut sequence: Vec<ArmId> = study
        .arms
        .iter()
        .zip(multiplicities)
        .flat_map(|(arm, count)| std::iter::repeat(arm.id.clone()).take(count))
        .collect();
    sequence.shuffle(rng);

    BlockSequence {
        study_id: study.id.clone(),
        block_number,
        sequence,
        created_at: now,
    }
}

/// Assign by block randomization.
///
/// `stored` is the sequence the store holds for the current block number,
/// if any.
pub fn block_assign<R: Rng + ?Sized>(
    study: &Study,
    stored: Option<&BlockSequence>,
    now: Timestamp,
    rng: &mut R,
) -> BlindingResult<ArmAssignment> {
    let (block_number, slot) = block_position(study);

    if slot == 0 {
        let block = generate_block(study, block_number, now, rng);
        let arm_id = block
            .sequence
            .first()
            .cloned()
            .ok_or_else(|| super::simple::no_arms(study))?;
        return Ok(ArmAssignment {
            arm_id,
            record: Some(AggregateRecord::BlockSequence(block)),
        });
    }

    let block = stored
        .filter(|b| b.block_number == block_number)
        .ok_or_else(|| BlindingError::IntegrityViolation {
            study_id: study.id.clone(),
            reason: format!("no stored sequence for block {}", block_number),
        })?;

    let arm_id = block
        .sequence
        .get(slot)
        .cloned()
        .ok_or_else(|| BlindingError::IntegrityViolation {
            study_id: study.id.clone(),
            reason: format!(
                "block {} has {} slots, slot {} requested",
                block_number,
                block.sequence.len(),
                slot
            ),
        })?;

    Ok(ArmAssignment {
        arm_id,
        record: None,
    })
}
