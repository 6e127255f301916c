//! # Emergency Unblinding
//!
//! Request/resolve workflow for disclosing one participant's arm before the
//! study is unblinded, and the guarded assignment lookup.
//!
//! ```text
//! request ──► can_unblind && !approval_required ──► APPROVED + EMERGENCY_UNBLINDING breach
//!    │
//!    └──────► PENDING ──► notify approvers ──► resolve ──► APPROVED + breach
//!                                                    └──► DENIED
//! ```
//!
//! Resolved requests never change again.

use super::breach::record_breach;
use super::new_id;
use crate::audit::actions;
use crate::domain::{
    details, ApprovalStatus, AssignmentDisclosure, AuditDraft, BlindingError, BlindingResult,
    Breach, BreachSeverity, BreachType, Mutation, MutationContext, Notification, Study,
    StudyStatus, UnblindingRequest, UserId,
};
use serde::{Deserialize, Serialize};

/// Topic sent to approvers of a pending request.
pub const TOPIC_UNBLINDING_PENDING: &str = "emergency_unblinding_pending";

/// Topic sent to the requester once a request is resolved.
pub const TOPIC_UNBLINDING_RESOLVED: &str = "emergency_unblinding_resolved";

/// Outcome of a request or resolution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnblindingDecision {
    /// Request after the operation.
    pub request: UnblindingRequest,
    /// Breach registered by an approval.
    pub breach: Option<Breach>,
}

/// Result of an assignment lookup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentAccess {
    /// The disclosed assignment.
    pub disclosure: AssignmentDisclosure,
    /// Breach registered because the access was not covered.
    pub breach: Option<Breach>,
}

fn emergency_breach(study: &mut Study, participant_id: &str, ctx: MutationContext<'_>) -> Breach {
    record_breach(
        study,
        BreachType::EmergencyUnblinding,
        BreachSeverity::High,
        format!("Emergency unblinding of participant {}", participant_id),
        vec![participant_id.to_string()],
        ctx,
    )
}

fn approval_targets(study: &Study, requester_approvers: &[UserId]) -> Vec<UserId> {
    if !requester_approvers.is_empty() {
        return requester_approvers.to_vec();
    }
    study
        .roles
        .iter()
        .filter(|r| r.is_authorized_unblinder())
        .map(|r| r.user_id.clone())
        .collect()
}

/// File an emergency unblinding request.
///
/// Auto-approved when the requester may unblind without approval.
pub fn request_emergency_unblinding(
    study: &mut Study,
    participant_id: &str,
    reason: &str,
    ctx: MutationContext<'_>,
) -> BlindingResult<Mutation<UnblindingDecision>> {
    study.ensure_status("request emergency unblinding", |s| !s.is_terminal())?;
    let role = study.require_role(ctx.actor)?.clone();
    study.require_participant(participant_id)?;

    if reason.trim().is_empty() {
        return Err(BlindingError::invalid_operation(
            &study.id,
            "an emergency unblinding reason is required",
        ));
    }

    let auto_approve = role.can_unblind && !role.approval_required;
    let mut request = UnblindingRequest {
        id: new_id("unblind"),
        participant_id: participant_id.to_string(),
        requested_by: ctx.actor.to_string(),
        reason: reason.to_string(),
        status: ApprovalStatus::Pending,
        approved_by: None,
        denial_reason: None,
        requested_at: ctx.now,
        resolved_at: None,
    };

    let mut notifications = Vec::new();
    let breach = if auto_approve {
        request.status = ApprovalStatus::Approved;
        request.approved_by = Some(ctx.actor.to_string());
        request.resolved_at = Some(ctx.now);
        Some(emergency_breach(study, participant_id, ctx))
    } else {
        notifications = approval_targets(study, &role.approvers)
            .into_iter()
            .map(|user_id| Notification {
                user_id,
                topic: TOPIC_UNBLINDING_PENDING.to_string(),
                message: format!(
                    "Emergency unblinding requested by {} in study {}",
                    ctx.actor, study.id
                ),
                data: details([
                    ("study_id", study.id.as_str().into()),
                    ("request_id", request.id.as_str().into()),
                    ("participant_id", participant_id.into()),
                    ("reason", reason.into()),
                ]),
            })
            .collect();
        None
    };

    study.unblinding_requests.push(request.clone());

    let mut audit_details = details([
        ("request_id", request.id.as_str().into()),
        ("reason", reason.into()),
        ("auto_approved", auto_approve.into()),
    ]);
    if let Some(breach) = &breach {
        audit_details.insert("breach_id".to_string(), breach.id.as_str().into());
    }
    let audit = AuditDraft::user(actions::EMERGENCY_UNBLINDING_REQUESTED, ctx.actor)
        .with_details(audit_details)
        .with_participants(vec![participant_id.to_string()]);

    Ok(Mutation::new(UnblindingDecision { request, breach }, audit)
        .with_notifications(notifications))
}

/// Approve or deny a pending request.
pub fn resolve_emergency_unblinding(
    study: &mut Study,
    request_id: &str,
    approved: bool,
    denial_reason: Option<&str>,
    ctx: MutationContext<'_>,
) -> BlindingResult<Mutation<UnblindingDecision>> {
    let role = study.require_role(ctx.actor)?;
    if !role.can_unblind {
        return Err(BlindingError::permission(&study.id, ctx.actor, "can_unblind"));
    }

    let current = study.unblinding_request(request_id).ok_or_else(|| {
        BlindingError::invalid_operation(&study.id, format!("unknown request {}", request_id))
    })?;
    if current.status.is_resolved() {
        return Err(BlindingError::invalid_operation(
            &study.id,
            format!("request {} is already resolved", request_id),
        ));
    }
    let participant_id = current.participant_id.clone();

    let breach = approved.then(|| emergency_breach(study, &participant_id, ctx));

    let request = match study
        .unblinding_requests
        .iter_mut()
        .find(|r| r.id == request_id)
    {
        Some(request) => {
            request.resolved_at = Some(ctx.now);
            if approved {
                request.status = ApprovalStatus::Approved;
                request.approved_by = Some(ctx.actor.to_string());
            } else {
                request.status = ApprovalStatus::Denied;
                request.denial_reason = denial_reason.map(str::to_string);
            }
            request.clone()
        }
        None => {
            return Err(BlindingError::invalid_operation(
                &study.id,
                format!("unknown request {}", request_id),
            ))
        }
    };

    let notification = Notification {
        user_id: request.requested_by.clone(),
        topic: TOPIC_UNBLINDING_RESOLVED.to_string(),
        message: format!(
            "Emergency unblinding request {} was {}",
            request.id,
            if approved { "approved" } else { "denied" }
        ),
        data: details([
            ("study_id", study.id.as_str().into()),
            ("request_id", request.id.as_str().into()),
            ("approved", approved.into()),
        ]),
    };

    let action = if approved {
        actions::EMERGENCY_UNBLINDING_APPROVED
    } else {
        actions::EMERGENCY_UNBLINDING_DENIED
    };
    let mut audit_details = details([("request_id", request.id.as_str().into())]);
    if let Some(reason) = &request.denial_reason {
        audit_details.insert("denial_reason".to_string(), reason.as_str().into());
    }
    if let Some(breach) = &breach {
        audit_details.insert("breach_id".to_string(), breach.id.as_str().into());
    }
    let audit = AuditDraft::user(action, ctx.actor)
        .with_details(audit_details)
        .with_participants(vec![participant_id]);

    Ok(Mutation::new(UnblindingDecision { request, breach }, audit)
        .with_notifications(vec![notification]))
}

/// Read one participant's true arm.
///
/// Access is always permitted and always audited. Outside `UNBLINDED` it
/// also registers an accidental-disclosure breach unless an approved
/// emergency unblinding covers the participant or the caller is an
/// authorized unblinder. `flag_authorized` removes the unblinder exemption.
pub fn access_assignment(
    study: &mut Study,
    participant_id: &str,
    flag_authorized: bool,
    ctx: MutationContext<'_>,
) -> BlindingResult<Mutation<AssignmentAccess>> {
    let role = study.require_role(ctx.actor)?;
    let unblinder = role.is_authorized_unblinder() && !flag_authorized;
    let participant = study.require_participant(participant_id)?;

    let disclosure = AssignmentDisclosure {
        participant_id: participant.participant_id.clone(),
        blinded_id: participant.blinded_id.clone(),
        arm_id: participant.arm_id.clone(),
        arm_name: study
            .arm(&participant.arm_id)
            .map(|a| a.name.clone())
            .unwrap_or_default(),
        withdrawn: !participant.is_active(),
    };

    let covered = study.status == StudyStatus::Unblinded
        || unblinder
        || study.has_approved_unblinding(participant_id);

    let breach = (!covered).then(|| {
        record_breach(
            study,
            BreachType::AccidentalDisclosure,
            BreachSeverity::Medium,
            format!(
                "Assignment of participant {} accessed by {} without unblinding approval",
                participant_id, ctx.actor
            ),
            vec![participant_id.to_string()],
            ctx,
        )
    });

    let mut audit_details = details([
        ("status", study.status.as_str().into()),
        ("flagged", breach.is_some().into()),
    ]);
    if let Some(breach) = &breach {
        audit_details.insert("breach_id".to_string(), breach.id.as_str().into());
    }
    let audit = AuditDraft::user(actions::PARTICIPANT_ASSIGNMENT_ACCESSED, ctx.actor)
        .with_details(audit_details)
        .with_participants(vec![participant_id.to_string()]);

    Ok(Mutation::new(AssignmentAccess { disclosure, breach }, audit))
}
