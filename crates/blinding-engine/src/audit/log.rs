//! # Audit Log
//!
//! Action names and read-side helpers over the append-only log.

use crate::domain::{AuditLogEntry, UserId};
use std::collections::HashMap;

/// Action names written to the audit log.
pub mod actions {
    /// Study created.
    pub const STUDY_CREATED: &str = "study_created";
    /// Lifecycle status changed.
    pub const STUDY_STATUS_CHANGED: &str = "study_status_changed";
    /// Role granted.
    pub const ROLE_ADDED: &str = "role_added";
    /// Role revoked.
    pub const ROLE_REMOVED: &str = "role_removed";
    /// Participant enrolled and randomized.
    pub const PARTICIPANT_ENROLLED: &str = "participant_enrolled";
    /// Participant withdrawn.
    pub const PARTICIPANT_WITHDRAWN: &str = "participant_withdrawn";
    /// A participant's true arm was read.
    pub const PARTICIPANT_ASSIGNMENT_ACCESSED: &str = "participant_assignment_accessed";
    /// Emergency unblinding requested.
    pub const EMERGENCY_UNBLINDING_REQUESTED: &str = "emergency_unblinding_requested";
    /// Emergency unblinding approved by an approver.
    pub const EMERGENCY_UNBLINDING_APPROVED: &str = "emergency_unblinding_approved";
    /// Emergency unblinding denied.
    pub const EMERGENCY_UNBLINDING_DENIED: &str = "emergency_unblinding_denied";
    /// Breach recorded.
    pub const BREACH_REGISTERED: &str = "breach_registered";
    /// Breach resolved.
    pub const BREACH_RESOLVED: &str = "breach_resolved";

    /// Actions counted as potential breaches by the integrity report.
    pub const SUSPICIOUS: [&str; 3] = [
        PARTICIPANT_ASSIGNMENT_ACCESSED,
        EMERGENCY_UNBLINDING_REQUESTED,
        EMERGENCY_UNBLINDING_APPROVED,
    ];

    /// Coarse lifecycle events visible to aggregated-only roles.
    pub const LIFECYCLE: [&str; 2] = [STUDY_CREATED, STUDY_STATUS_CHANGED];
}

/// Terms that hide an entry from blinded roles.
const SENSITIVE_TERMS: [&str; 3] = ["unblind", "breach", "emergency"];

/// Entry reveals unblinding, breach or emergency activity.
pub fn is_sensitive(entry: &AuditLogEntry) -> bool {
    let action = entry.action.to_lowercase();
    SENSITIVE_TERMS.iter().any(|term| action.contains(term))
        || entry.details.values().any(|value| {
            value
                .as_text()
                .map(|text| {
                    let text = text.to_lowercase();
                    SENSITIVE_TERMS.iter().any(|term| text.contains(term))
                })
                .unwrap_or(false)
        })
}

/// Entry is a coarse study-lifecycle event.
pub fn is_lifecycle(entry: &AuditLogEntry) -> bool {
    actions::LIFECYCLE.contains(&entry.action.as_str())
}

/// Entry's action is in the suspicious set.
pub fn is_suspicious(entry: &AuditLogEntry) -> bool {
    actions::SUSPICIOUS.contains(&entry.action.as_str())
}

/// Assignment reads per `(actor, participant)` pair.
pub fn assignment_access_counts(log: &[AuditLogEntry]) -> HashMap<(UserId, String), usize> {
    let mut counts = HashMap::new();
    for entry in log
        .iter()
        .filter(|e| e.action == actions::PARTICIPANT_ASSIGNMENT_ACCESSED)
    {
        for participant in entry.participant_ids.iter().flatten() {
            *counts
                .entry((entry.actor.clone(), participant.clone()))
                .or_insert(0) += 1;
        }
    }
    counts
}
