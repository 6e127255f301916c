//! # Study Roster
//!
//! Role grants and participant enrollment/withdrawal.

use super::new_id;
use crate::algorithms::ArmAssignment;
use crate::audit::actions;
use crate::domain::{
    details, invariant_full_access_retained, AccessLevel, ArmId, AuditDraft, BlindedParticipant,
    BlindingError, BlindingResult, Mutation, MutationContext, ParticipantId, Study, StudyRole,
    StudyStatus, Timestamp,
};
use serde::{Deserialize, Serialize};

/// What the enrolling user learns about a new participant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentReceipt {
    /// External participant id.
    pub participant_id: ParticipantId,
    /// Blinded id to use in study records.
    pub blinded_id: String,
    /// Enrollment timestamp.
    pub enrolled_at: Timestamp,
    /// Assigned arm, only for `full_access` enrollers.
    pub arm_id: Option<ArmId>,
}

/// Grant a role.
pub fn add_role(
    study: &mut Study,
    mut role: StudyRole,
    ctx: MutationContext<'_>,
) -> BlindingResult<Mutation<StudyRole>> {
    study.ensure_status("add role", |s| s != StudyStatus::Terminated)?;
    study.require_full_access(ctx.actor)?;

    if study.role_for(&role.user_id).is_some() {
        return Err(BlindingError::invalid_operation(
            &study.id,
            format!("user {} already holds a role", role.user_id),
        ));
    }

    role.assigned_at = ctx.now;
    study.roles.push(role.clone());

    let audit = AuditDraft::user(actions::ROLE_ADDED, ctx.actor).with_details(details([
        ("user_id", role.user_id.as_str().into()),
        ("role", role.role.as_str().into()),
        ("access_level", role.access_level.as_str().into()),
        ("can_unblind", role.can_unblind.into()),
    ]));

    Ok(Mutation::new(role, audit))
}

/// Revoke a role. The last `full_access` holder cannot be removed.
pub fn remove_role(
    study: &mut Study,
    user_id: &str,
    ctx: MutationContext<'_>,
) -> BlindingResult<Mutation<StudyRole>> {
    study.ensure_status("remove role", |s| s != StudyStatus::Terminated)?;
    study.require_full_access(ctx.actor)?;

    let index = study
        .roles
        .iter()
        .position(|r| r.user_id == user_id)
        .ok_or_else(|| {
            BlindingError::invalid_operation(&study.id, format!("user {} holds no role", user_id))
        })?;

    let removed = study.roles.remove(index);
    invariant_full_access_retained(study)?;

    let audit = AuditDraft::user(actions::ROLE_REMOVED, ctx.actor).with_details(details([
        ("user_id", removed.user_id.as_str().into()),
        ("role", removed.role.as_str().into()),
    ]));

    Ok(Mutation::new(removed, audit))
}

/// The caller's role if it may enroll or withdraw participants.
pub fn require_enroller<'a>(study: &'a Study, user_id: &str) -> BlindingResult<&'a StudyRole> {
    let role = study.require_role(user_id)?;
    match role.access_level {
        AccessLevel::FullAccess | AccessLevel::BlindedAccess => Ok(role),
        AccessLevel::AggregatedOnly | AccessLevel::MetadataOnly => Err(BlindingError::permission(
            &study.id,
            user_id,
            AccessLevel::BlindedAccess.as_str(),
        )),
    }
}

/// Record a randomized participant.
pub fn enroll_participant(
    study: &mut Study,
    participant_id: &str,
    assignment: ArmAssignment,
    data_partitions: Vec<String>,
    ctx: MutationContext<'_>,
) -> BlindingResult<Mutation<EnrollmentReceipt>> {
    study.ensure_status("enroll participant", |s| s.accepts_enrollment())?;
    let full_access = require_enroller(study, ctx.actor)?.is_full_access();

    if study.participant(participant_id).is_some() {
        return Err(BlindingError::invalid_operation(
            &study.id,
            format!("participant {} is already enrolled", participant_id),
        ));
    }
    if study.arm(&assignment.arm_id).is_none() {
        return Err(BlindingError::IntegrityViolation {
            study_id: study.id.clone(),
            reason: format!("assignment to unknown arm {}", assignment.arm_id),
        });
    }

    let participant = BlindedParticipant {
        participant_id: participant_id.to_string(),
        blinded_id: new_id("BP"),
        arm_id: assignment.arm_id,
        enrolled_at: ctx.now,
        withdrawn_at: None,
        withdrawal_reason: None,
        data_partitions,
    };

    let receipt = EnrollmentReceipt {
        participant_id: participant.participant_id.clone(),
        blinded_id: participant.blinded_id.clone(),
        enrolled_at: ctx.now,
        arm_id: full_access.then(|| participant.arm_id.clone()),
    };

    let audit = AuditDraft::user(actions::PARTICIPANT_ENROLLED, ctx.actor)
        .with_details(details([
            ("blinded_id", participant.blinded_id.as_str().into()),
            ("method", study.randomization.method.as_str().into()),
            ("partitions", participant.data_partitions.clone().into()),
        ]))
        .with_participants(vec![participant.participant_id.clone()]);

    study.participants.push(participant);

    Ok(Mutation::new(receipt, audit).with_record(assignment.record))
}

/// Soft-withdraw a participant.
pub fn withdraw_participant(
    study: &mut Study,
    participant_id: &str,
    reason: &str,
    ctx: MutationContext<'_>,
) -> BlindingResult<Mutation<BlindedParticipant>> {
    study.ensure_status("withdraw participant", |s| !s.is_terminal())?;
    require_enroller(study, ctx.actor)?;
    study.require_participant(participant_id)?;

    let study_id = study.id.clone();
    let participant = study
        .participants
        .iter_mut()
        .find(|p| p.participant_id == participant_id)
        .ok_or_else(|| BlindingError::participant_not_found(&study_id, participant_id))?;

    if !participant.is_active() {
        return Err(BlindingError::invalid_operation(
            &study_id,
            format!("participant {} has already withdrawn", participant_id),
        ));
    }

    participant.withdrawn_at = Some(ctx.now);
    participant.withdrawal_reason = Some(reason.to_string());
    let participant = participant.clone();

    let audit = AuditDraft::user(actions::PARTICIPANT_WITHDRAWN, ctx.actor)
        .with_details(details([
            ("blinded_id", participant.blinded_id.as_str().into()),
            ("reason", reason.into()),
        ]))
        .with_participants(vec![participant.participant_id.clone()]);

    Ok(Mutation::new(participant, audit))
}
