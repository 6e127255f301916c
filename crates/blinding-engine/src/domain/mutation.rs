//! # Mutation Envelope
//!
//! Workflow functions mutate a working copy of the study and describe the
//! side effects of the change in a [`Mutation`]. The coordinator turns the
//! audit draft into exactly one log entry, bumps the version, commits the
//! study with its side records and only then sends notifications.

use super::entities::{AggregateRecord, AuditLogEntry};
use super::errors::{ParticipantId, Timestamp, UserId};
use super::value_objects::AuditDetails;
use serde::{Deserialize, Serialize};

/// Who is mutating, and when.
#[derive(Clone, Copy, Debug)]
pub struct MutationContext<'a> {
    /// Acting user.
    pub actor: &'a str,
    /// Commit timestamp.
    pub now: Timestamp,
}

impl<'a> MutationContext<'a> {
    /// Create a context.
    pub fn new(actor: &'a str, now: Timestamp) -> Self {
        Self { actor, now }
    }
}

/// Fire-and-forget message for a role holder.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Recipient.
    pub user_id: UserId,
    /// Topic, e.g. `emergency_unblinding_pending`.
    pub topic: String,
    /// Human-readable message.
    pub message: String,
    /// Structured payload.
    pub data: AuditDetails,
}

/// Audit entry waiting for an id and a commit timestamp.
#[derive(Clone, Debug, PartialEq)]
pub struct AuditDraft {
    /// Action name.
    pub action: String,
    /// Acting user.
    pub actor: UserId,
    /// Structured payload.
    pub details: AuditDetails,
    /// Affected participants.
    pub participant_ids: Option<Vec<ParticipantId>>,
    /// Engine-generated entry.
    pub system_generated: bool,
}

impl AuditDraft {
    /// Entry for a user-triggered action.
    pub fn user(action: &str, actor: &str) -> Self {
        Self {
            action: action.to_string(),
            actor: actor.to_string(),
            details: AuditDetails::new(),
            participant_ids: None,
            system_generated: false,
        }
    }

    /// Entry generated by the engine on behalf of `actor`.
    pub fn system(action: &str, actor: &str) -> Self {
        Self {
            system_generated: true,
            ..Self::user(action, actor)
        }
    }

    /// Attach details.
    pub fn with_details(mut self, details: AuditDetails) -> Self {
        self.details = details;
        self
    }

    /// Attach affected participants.
    pub fn with_participants(mut self, participant_ids: Vec<ParticipantId>) -> Self {
        self.participant_ids = Some(participant_ids);
        self
    }

    /// Finalize into a log entry.
    pub fn into_entry(self, id: String, timestamp: Timestamp) -> AuditLogEntry {
        AuditLogEntry {
            id,
            timestamp,
            action: self.action,
            actor: self.actor,
            details: self.details,
            participant_ids: self.participant_ids,
            system_generated: self.system_generated,
        }
    }
}

/// Outcome of a validated mutation, not yet committed.
#[derive(Clone, Debug)]
pub struct Mutation<T> {
    /// Value returned to the caller after commit.
    pub value: T,
    /// The single audit entry for this mutation.
    pub audit: AuditDraft,
    /// Messages sent after commit.
    pub notifications: Vec<Notification>,
    /// Side records committed with the study.
    pub records: Vec<AggregateRecord>,
}

impl<T> Mutation<T> {
    /// Mutation with no side effects beyond the audit entry.
    pub fn new(value: T, audit: AuditDraft) -> Self {
        Self {
            value,
            audit,
            notifications: Vec::new(),
            records: Vec::new(),
        }
    }

    /// Add notifications.
    pub fn with_notifications(mut self, notifications: Vec<Notification>) -> Self {
        self.notifications.extend(notifications);
        self
    }

    /// Add a side record.
    pub fn with_record(mut self, record: Option<AggregateRecord>) -> Self {
        self.records.extend(record);
        self
    }
}
