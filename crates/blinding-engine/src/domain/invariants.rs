//! # Domain Invariants
//!
//! Business rules that must hold after every committed mutation.

use super::entities::{StratumCounts, Study};
use super::errors::{BlindingError, BlindingResult};
use super::value_objects::RandomizationMethod;

/// Invariant: every participant references an existing arm.
pub fn invariant_arm_references(study: &Study) -> BlindingResult<()> {
    for participant in &study.participants {
        if study.arm(&participant.arm_id).is_none() {
            return Err(BlindingError::IntegrityViolation {
                study_id: study.id.clone(),
                reason: format!(
                    "participant {} references unknown arm {}",
                    participant.participant_id, participant.arm_id
                ),
            });
        }
    }
    Ok(())
}

/// Invariant: at least one `full_access` role remains.
pub fn invariant_full_access_retained(study: &Study) -> BlindingResult<()> {
    if study.full_access_count() == 0 {
        return Err(BlindingError::invalid_operation(
            &study.id,
            "study must retain at least one full_access role",
        ));
    }
    Ok(())
}

/// Invariant: no block holds more of an arm than its configured repetitions.
///
/// Participants are grouped into blocks in enrollment order.
pub fn invariant_block_allocation(study: &Study) -> BlindingResult<()> {
    if study.randomization.method != RandomizationMethod::Block || study.arms.is_empty() {
        return Ok(());
    }

    let arm_count = study.arms.len();
    let block_size = study.randomization.block_size_for(arm_count);
    let allowed = study.randomization.block_multiplicities(arm_count);

    for (block_number, block) in study.participants.chunks(block_size).enumerate() {
        for (arm, limit) in study.arms.iter().zip(&allowed) {
            let used = block.iter().filter(|p| p.arm_id == arm.id).count();
            if used > *limit {
                return Err(BlindingError::IntegrityViolation {
                    study_id: study.id.clone(),
                    reason: format!(
                        "block {} assigns {} to arm {} (limit {})",
                        block_number, used, arm.id, limit
                    ),
                });
            }
        }
    }
    Ok(())
}

/// Invariant: per-arm counts within a stratum differ by at most one.
pub fn invariant_stratum_balance(counts: &StratumCounts) -> BlindingResult<()> {
    let max = counts.counts.values().max().copied().unwrap_or(0);
    let min = counts.counts.values().min().copied().unwrap_or(0);
    if max - min > 1 {
        return Err(BlindingError::IntegrityViolation {
            study_id: counts.study_id.clone(),
            reason: format!(
                "stratum {} spread {} exceeds 1",
                counts.stratum_id,
                max - min
            ),
        });
    }
    Ok(())
}

/// Invariant: a commit adds exactly one audit entry and one version.
pub fn invariant_single_commit_step(before: &Study, after: &Study) -> BlindingResult<()> {
    if after.version != before.version + 1 {
        return Err(BlindingError::IntegrityViolation {
            study_id: after.id.clone(),
            reason: format!(
                "version must advance by one ({} -> {})",
                before.version, after.version
            ),
        });
    }
    if after.audit_log.len() != before.audit_log.len() + 1 {
        return Err(BlindingError::IntegrityViolation {
            study_id: after.id.clone(),
            reason: format!(
                "commit must append exactly one audit entry ({} -> {})",
                before.audit_log.len(),
                after.audit_log.len()
            ),
        });
    }
    if after.audit_log[..before.audit_log.len()] != before.audit_log[..] {
        return Err(BlindingError::IntegrityViolation {
            study_id: after.id.clone(),
            reason: "audit log entries may not be edited".to_string(),
        });
    }
    Ok(())
}

/// All aggregate invariants checked before a commit.
pub fn check_study_invariants(study: &Study) -> BlindingResult<()> {
    invariant_arm_references(study)?;
    invariant_full_access_retained(study)?;
    invariant_block_allocation(study)
}
