//! # Assignment Dispatch
//!
//! Checks enrollment preconditions and routes to the configured strategy.
//!
//! | Method | Reads | Writes |
//! |--------|-------|--------|
//! | Simple | - | - |
//! | Block | current block sequence | new block sequence at slot 0 |
//! | Stratified | stratum counts | updated stratum counts |
//! | Adaptive | active arm counts | - |
//! | Minimization | attributes of enrolled participants | - |

use super::{adaptive, block, minimization, simple, stratified};
use crate::domain::{
    AggregateRecord, ArmId, BlindingError, BlindingResult, BlockSequence, ParticipantAttributes,
    ParticipantId, RandomizationMethod, StratumCounts, Study, Timestamp,
};
use rand::Rng;
use std::collections::HashMap;

/// Inputs gathered from the ports before randomizing.
#[derive(Clone, Copy, Debug)]
pub struct AssignmentInput<'a> {
    /// Participant being enrolled.
    pub participant_id: &'a str,
    /// Directory attributes of that participant.
    pub attributes: &'a ParticipantAttributes,
    /// Stored sequence of the current block (block randomization).
    pub block_sequence: Option<&'a BlockSequence>,
    /// Stored counts of the participant's stratum (stratified).
    pub stratum_counts: Option<&'a StratumCounts>,
    /// Attributes of already enrolled participants (minimization).
    pub population: &'a HashMap<ParticipantId, ParticipantAttributes>,
    /// Commit timestamp.
    pub now: Timestamp,
}

/// Chosen arm plus the side record to commit with it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArmAssignment {
    /// Assigned arm.
    pub arm_id: ArmId,
    /// Block sequence or stratum counts to store.
    pub record: Option<AggregateRecord>,
}

impl ArmAssignment {
    fn plain(arm_id: ArmId) -> Self {
        Self {
            arm_id,
            record: None,
        }
    }
}

/// Randomize one participant.
pub fn assign<R: Rng + ?Sized>(
    study: &Study,
    input: &AssignmentInput<'_>,
    rng: &mut R,
) -> BlindingResult<ArmAssignment> {
    study.ensure_status("enroll participant", |s| s.accepts_enrollment())?;

    if study.participant(input.participant_id).is_some() {
        return Err(BlindingError::invalid_operation(
            &study.id,
            format!("participant {} is already enrolled", input.participant_id),
        ));
    }
    if study.arms.is_empty() {
        return Err(simple::no_arms(study));
    }
    study.randomization.validate(&study.id, study.arms.len())?;

    match study.randomization.method {
        RandomizationMethod::Simple => simple::simple_assign(study, rng).map(ArmAssignment::plain),
        RandomizationMethod::Block => {
            block::block_assign(study, input.block_sequence, input.now, rng)
        }
        RandomizationMethod::Stratified => {
            stratified::stratified_assign(study, input.attributes, input.stratum_counts, rng)
        }
        RandomizationMethod::Adaptive => {
            adaptive::adaptive_assign(study, rng).map(ArmAssignment::plain)
        }
        RandomizationMethod::Minimization => minimization::minimization_assign(
            study,
            input.attributes,
            input.population,
            rng,
        )
        .map(ArmAssignment::plain),
    }
}
