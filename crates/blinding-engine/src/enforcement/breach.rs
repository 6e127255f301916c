//! # Breach Registry
//!
//! Append-only breach records. Any role holder may report a breach;
//! `critical` reports notify every `full_access` holder. Resolution is a
//! one-time `full_access` action.

use super::new_id;
use crate::audit::actions;
use crate::domain::{
    details, AuditDraft, BlindingError, BlindingResult, Breach, BreachReport, BreachResolution,
    BreachSeverity, BreachType, Mutation, MutationContext, Notification, ParticipantId, Study,
};

/// Notification topic for critical breaches.
pub const TOPIC_CRITICAL_BREACH: &str = "critical_breach";

/// Append a breach to the working copy and return it.
pub(crate) fn record_breach(
    study: &mut Study,
    breach_type: BreachType,
    severity: BreachSeverity,
    description: String,
    affected_participants: Vec<ParticipantId>,
    ctx: MutationContext<'_>,
) -> Breach {
    let breach = Breach {
        id: new_id("breach"),
        breach_type,
        severity,
        description,
        affected_participants,
        affected_researchers: vec![ctx.actor.to_string()],
        reported_by: ctx.actor.to_string(),
        occurred_at: ctx.now,
        reported_at: ctx.now,
        resolution: None,
    };
    study.breaches.push(breach.clone());
    breach
}

/// Notifications for every `full_access` holder about a critical breach.
pub(crate) fn critical_notifications(study: &Study, breach: &Breach) -> Vec<Notification> {
    if breach.severity != BreachSeverity::Critical {
        return Vec::new();
    }
    study
        .roles
        .iter()
        .filter(|r| r.is_full_access())
        .map(|r| Notification {
            user_id: r.user_id.clone(),
            topic: TOPIC_CRITICAL_BREACH.to_string(),
            message: format!("Critical blinding breach reported in study {}", study.id),
            data: details([
                ("study_id", study.id.as_str().into()),
                ("breach_id", breach.id.as_str().into()),
                ("reported_by", breach.reported_by.as_str().into()),
            ]),
        })
        .collect()
}

/// Register a reported breach.
pub fn register_breach(
    study: &mut Study,
    report: BreachReport,
    ctx: MutationContext<'_>,
) -> BlindingResult<Mutation<Breach>> {
    study.require_role(ctx.actor)?;

    if report.description.trim().is_empty() {
        return Err(BlindingError::invalid_operation(
            &study.id,
            "breach description must not be empty",
        ));
    }
    for participant_id in &report.affected_participants {
        study.require_participant(participant_id)?;
    }

    let breach = Breach {
        id: new_id("breach"),
        breach_type: report.breach_type,
        severity: report.severity,
        description: report.description,
        affected_participants: report.affected_participants,
        affected_researchers: report.affected_researchers,
        reported_by: ctx.actor.to_string(),
        occurred_at: report.occurred_at.unwrap_or(ctx.now),
        reported_at: ctx.now,
        resolution: None,
    };
    study.breaches.push(breach.clone());

    let notifications = critical_notifications(study, &breach);
    let audit = AuditDraft::user(actions::BREACH_REGISTERED, ctx.actor)
        .with_details(details([
            ("breach_id", breach.id.as_str().into()),
            ("breach_type", format!("{:?}", breach.breach_type).into()),
            ("severity", format!("{:?}", breach.severity).into()),
        ]))
        .with_participants(breach.affected_participants.clone());

    Ok(Mutation::new(breach, audit).with_notifications(notifications))
}

/// Record the corrective action taken for a breach.
pub fn resolve_breach(
    study: &mut Study,
    breach_id: &str,
    action_taken: &str,
    ctx: MutationContext<'_>,
) -> BlindingResult<Mutation<Breach>> {
    study.require_full_access(ctx.actor)?;

    let study_id = study.id.clone();
    let breach = study
        .breaches
        .iter_mut()
        .find(|b| b.id == breach_id)
        .ok_or_else(|| {
            BlindingError::invalid_operation(&study_id, format!("unknown breach {}", breach_id))
        })?;

    if breach.resolution.is_some() {
        return Err(BlindingError::invalid_operation(
            &study_id,
            format!("breach {} is already resolved", breach_id),
        ));
    }

    breach.resolution = Some(BreachResolution {
        action_taken: action_taken.to_string(),
        resolved_by: ctx.actor.to_string(),
        resolved_at: ctx.now,
    });
    let breach = breach.clone();

    let audit = AuditDraft::user(actions::BREACH_RESOLVED, ctx.actor).with_details(details([
        ("breach_id", breach.id.as_str().into()),
        ("action_taken", action_taken.into()),
    ]));

    Ok(Mutation::new(breach, audit))
}
