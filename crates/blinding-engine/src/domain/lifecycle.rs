//! # Study Lifecycle
//!
//! Guards and applies status transitions.
//!
//! | Transition | Extra requirement |
//! |------------|-------------------|
//! | `SETUP → ACTIVE` | at least one arm, valid randomization config |
//! | `ACTIVE ⇄ PAUSED` | - |
//! | `ACTIVE/PAUSED → COMPLETED` | - |
//! | `COMPLETED → UNBLINDED` | `can_unblind`; discloses every assignment |
//! | `* → TERMINATED` | source must be non-terminal |
//!
//! Every transition requires `full_access`.
//!
//! New studies start in `SETUP` at version 1 with a single `study_created`
//! entry.

use super::entities::{AssignmentDisclosure, Study, StudyDefinition, UnblindingResult};
use super::errors::{BlindingError, BlindingResult, StudyId};
use super::mutation::{AuditDraft, Mutation, MutationContext};
use super::value_objects::{details, ApprovalStatus, StudyStatus};
use crate::audit::actions;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Result of a committed status change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTransition {
    /// Study id.
    pub study_id: StudyId,
    /// Prior status.
    pub from: StudyStatus,
    /// New status.
    pub to: StudyStatus,
    /// Present for `COMPLETED → UNBLINDED`.
    pub unblinding: Option<UnblindingResult>,
}

/// Validate and apply a status transition on a working copy.
pub fn transition_status(
    study: &mut Study,
    target: StudyStatus,
    ctx: MutationContext<'_>,
) -> BlindingResult<Mutation<StatusTransition>> {
    let from = study.status;
    study.ensure_status(&format!("transition to {}", target), |s| {
        s.can_transition_to(target)
    })?;

    let role = study.require_full_access(ctx.actor)?;

    if target == StudyStatus::Unblinded && !role.can_unblind {
        return Err(BlindingError::permission(&study.id, ctx.actor, "can_unblind"));
    }

    if from == StudyStatus::Setup && target == StudyStatus::Active {
        if study.arms.is_empty() {
            return Err(BlindingError::invalid_operation(
                &study.id,
                "cannot activate a study without arms",
            ));
        }
        study.randomization.validate(&study.id, study.arms.len())?;
    }

    let unblinding = (target == StudyStatus::Unblinded).then(|| disclose_all(study, ctx));

    study.status = target;

    let pending = study
        .unblinding_requests
        .iter()
        .filter(|r| r.status == ApprovalStatus::Pending)
        .count();

    let audit = AuditDraft::system(actions::STUDY_STATUS_CHANGED, ctx.actor).with_details(details([
        ("from", from.as_str().into()),
        ("to", target.as_str().into()),
        ("pending_requests", pending.into()),
    ]));

    Ok(Mutation::new(
        StatusTransition {
            study_id: study.id.clone(),
            from,
            to: target,
            unblinding,
        },
        audit,
    ))
}

/// Validate a definition and build the initial `SETUP` study.
///
/// The returned study has version 0 and an empty log; the coordinator
/// appends the creation entry and stores it as version 1.
pub fn create_study(
    definition: StudyDefinition,
    ctx: MutationContext<'_>,
) -> BlindingResult<Mutation<Study>> {
    let StudyDefinition {
        id,
        title,
        blinding_level,
        randomization,
        arms,
        mut roles,
    } = definition;

    if id.trim().is_empty() {
        return Err(BlindingError::invalid_operation(&id, "study id must not be empty"));
    }

    let mut arm_ids = HashSet::new();
    if let Some(duplicate) = arms.iter().find(|a| !arm_ids.insert(a.id.as_str())) {
        return Err(BlindingError::invalid_operation(
            &id,
            format!("duplicate arm id {}", duplicate.id),
        ));
    }

    let mut users = HashSet::new();
    if let Some(duplicate) = roles.iter().find(|r| !users.insert(r.user_id.as_str())) {
        return Err(BlindingError::invalid_operation(
            &id,
            format!("user {} holds more than one role", duplicate.user_id),
        ));
    }

    randomization.validate(&id, arms.len())?;

    for role in &mut roles {
        role.assigned_at = ctx.now;
    }

    let study = Study {
        id,
        title,
        blinding_level,
        status: StudyStatus::Setup,
        randomization,
        arms,
        participants: Vec::new(),
        roles,
        unblinding_requests: Vec::new(),
        breaches: Vec::new(),
        audit_log: Vec::new(),
        version: 0,
        created_by: ctx.actor.to_string(),
        created_at: ctx.now,
        updated_at: ctx.now,
    };
    super::invariants::invariant_full_access_retained(&study)?;

    let audit = AuditDraft::user(actions::STUDY_CREATED, ctx.actor).with_details(details([
        ("title", study.title.as_str().into()),
        ("arms", study.arms.len().into()),
        ("roles", study.roles.len().into()),
        ("method", study.randomization.method.as_str().into()),
    ]));

    Ok(Mutation::new(study, audit))
}

fn disclose_all(study: &Study, ctx: MutationContext<'_>) -> UnblindingResult {
    let assignments = study
        .participants
        .iter()
        .map(|p| AssignmentDisclosure {
            participant_id: p.participant_id.clone(),
            blinded_id: p.blinded_id.clone(),
            arm_id: p.arm_id.clone(),
            arm_name: study
                .arm(&p.arm_id)
                .map(|a| a.name.clone())
                .unwrap_or_default(),
            withdrawn: !p.is_active(),
        })
        .collect();

    UnblindingResult {
        study_id: study.id.clone(),
        unblinded_by: ctx.actor.to_string(),
        unblinded_at: ctx.now,
        assignments,
    }
}
