//! # Domain Errors
//!
//! Error types for the blinding engine.
//!
//! Domain errors are always raised before anything is committed. Persistence
//! failures live in [`StoreError`] so a version conflict can be told apart
//! from a rejected operation and retried.

use thiserror::Error;

/// Study identifier.
pub type StudyId = String;

/// Treatment arm identifier.
pub type ArmId = String;

/// External participant identifier.
pub type ParticipantId = String;

/// User identifier of a role holder.
pub type UserId = String;

/// Emergency unblinding request identifier.
pub type RequestId = String;

/// Breach identifier.
pub type BreachId = String;

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

/// Persistence errors reported by a [`crate::ports::StudyStore`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Another writer committed first; re-read and retry.
    #[error("Version conflict on study {study_id}: expected {expected}, found {actual}")]
    VersionConflict {
        /// Study being written
        study_id: StudyId,
        /// Version the writer read
        expected: u64,
        /// Version currently stored
        actual: u64,
    },

    /// No study stored under this id.
    #[error("Study not found: {0}")]
    StudyNotFound(StudyId),

    /// A study with this id already exists.
    #[error("Study already exists: {0}")]
    AlreadyExists(StudyId),

    /// Backend failure.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Delivery failure of a notification or audit sink.
///
/// Sinks are fire-and-forget: the coordinator logs these and carries on.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SinkError {
    /// Sink could not accept the message.
    #[error("Sink unavailable: {0}")]
    Unavailable(String),
}

/// Blinding engine error types.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BlindingError {
    /// Operation is illegal for the study's lifecycle state.
    #[error("Invalid study state for {operation} on study {study_id}: status is {status}")]
    InvalidStudyState {
        /// Study id
        study_id: StudyId,
        /// Current status
        status: String,
        /// Attempted operation
        operation: String,
    },

    /// Role or access-level check failed.
    #[error("Insufficient permissions for {user_id} on study {study_id}: requires {required}")]
    InsufficientPermissions {
        /// Study id
        study_id: StudyId,
        /// Caller
        user_id: UserId,
        /// Missing capability
        required: String,
    },

    /// Randomization configuration is missing or inconsistent.
    #[error("Invalid randomization parameter {field} on study {study_id}: {reason}")]
    InvalidRandomizationParams {
        /// Study id
        study_id: StudyId,
        /// Offending configuration field
        field: String,
        /// What is wrong with it
        reason: String,
    },

    /// Participant is not enrolled in the study.
    #[error("Participant {participant_id} not found in study {study_id}")]
    ParticipantNotFound {
        /// Study id
        study_id: StudyId,
        /// Participant id
        participant_id: ParticipantId,
    },

    /// Generic precondition failure.
    #[error("Invalid operation on study {study_id}: {reason}")]
    InvalidOperation {
        /// Study id
        study_id: StudyId,
        /// Failed precondition
        reason: String,
    },

    /// Stored aggregate state contradicts an engine invariant.
    #[error("Integrity violation on study {study_id}: {reason}")]
    IntegrityViolation {
        /// Study id
        study_id: StudyId,
        /// Violated invariant
        reason: String,
    },

    /// Persistence failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BlindingError {
    /// True when the caller may re-read the study and try again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(StoreError::VersionConflict { .. }))
    }

    pub(crate) fn invalid_operation(study_id: &str, reason: impl Into<String>) -> Self {
        Self::InvalidOperation {
            study_id: study_id.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_params(
        study_id: &str,
        field: &str,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidRandomizationParams {
            study_id: study_id.to_string(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn permission(study_id: &str, user_id: &str, required: &str) -> Self {
        Self::InsufficientPermissions {
            study_id: study_id.to_string(),
            user_id: user_id.to_string(),
            required: required.to_string(),
        }
    }

    pub(crate) fn participant_not_found(study_id: &str, participant_id: &str) -> Self {
        Self::ParticipantNotFound {
            study_id: study_id.to_string(),
            participant_id: participant_id.to_string(),
        }
    }
}

/// Result type for blinding engine operations.
pub type BlindingResult<T> = Result<T, BlindingError>;
