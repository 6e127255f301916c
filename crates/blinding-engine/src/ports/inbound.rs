//! # Inbound Ports
//!
//! API trait defining what the blinding engine can do. Every call names the
//! acting user; the engine resolves their role in the study.

use crate::audit::IntegrityReport;
use crate::domain::{
    AuditLogEntry, BlindingResult, BlindedParticipant, Breach, BreachReport, StatusTransition,
    Study, StudyDefinition, StudyRole, StudyStatus, UnblindingRequest,
};
use crate::enforcement::{AssignmentAccess, EnrollmentReceipt, UnblindingDecision};
use async_trait::async_trait;

/// Blinding engine API - inbound port.
#[async_trait]
pub trait BlindingApi: Send + Sync {
    /// Create a study in `SETUP`.
    async fn create_study(&self, definition: StudyDefinition, actor: &str) -> BlindingResult<Study>;

    /// Grant a role.
    async fn add_role(&self, study_id: &str, role: StudyRole, actor: &str)
        -> BlindingResult<StudyRole>;

    /// Revoke a role.
    async fn remove_role(&self, study_id: &str, user_id: &str, actor: &str)
        -> BlindingResult<StudyRole>;

    /// Randomize and enroll a participant.
    async fn enroll_participant(
        &self,
        study_id: &str,
        participant_id: &str,
        data_partitions: Vec<String>,
        actor: &str,
    ) -> BlindingResult<EnrollmentReceipt>;

    /// Soft-withdraw a participant.
    async fn withdraw_participant(
        &self,
        study_id: &str,
        participant_id: &str,
        reason: &str,
        actor: &str,
    ) -> BlindingResult<BlindedParticipant>;

    /// Move the study through its lifecycle.
    async fn transition_status(
        &self,
        study_id: &str,
        target: StudyStatus,
        actor: &str,
    ) -> BlindingResult<StatusTransition>;

    /// The study as the actor's role may see it.
    async fn get_study_view(&self, study_id: &str, actor: &str) -> BlindingResult<Study>;

    /// A participant's true arm. Audited, and flagged as a breach unless covered.
    async fn get_participant_assignment(
        &self,
        study_id: &str,
        participant_id: &str,
        actor: &str,
    ) -> BlindingResult<AssignmentAccess>;

    /// File an emergency unblinding request.
    async fn request_emergency_unblinding(
        &self,
        study_id: &str,
        participant_id: &str,
        reason: &str,
        actor: &str,
    ) -> BlindingResult<UnblindingDecision>;

    /// Approve or deny a pending request.
    async fn resolve_emergency_unblinding(
        &self,
        study_id: &str,
        request_id: &str,
        approved: bool,
        denial_reason: Option<&str>,
        actor: &str,
    ) -> BlindingResult<UnblindingDecision>;

    /// Pending requests, for users who may unblind.
    async fn list_pending_unblinding_requests(
        &self,
        study_id: &str,
        actor: &str,
    ) -> BlindingResult<Vec<UnblindingRequest>>;

    /// Record a breach.
    async fn register_breach(
        &self,
        study_id: &str,
        report: BreachReport,
        actor: &str,
    ) -> BlindingResult<Breach>;

    /// Record the corrective action for a breach.
    async fn resolve_breach(
        &self,
        study_id: &str,
        breach_id: &str,
        action_taken: &str,
        actor: &str,
    ) -> BlindingResult<Breach>;

    /// Integrity score and recommendations.
    async fn compute_integrity(
        &self,
        study_id: &str,
        actor: &str,
    ) -> BlindingResult<IntegrityReport>;

    /// The audit log as the actor's role may see it.
    async fn get_audit_log(
        &self,
        study_id: &str,
        actor: &str,
    ) -> BlindingResult<Vec<AuditLogEntry>>;
}
