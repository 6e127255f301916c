//! # Domain Entities
//!
//! The study aggregate and everything it owns.
//!
//! A [`Study`] is replaced wholesale on every committed mutation and its
//! `version` grows by exactly one. Block sequences and stratum counts are
//! stored beside the study (keyed by study id) but committed together with it.

use super::errors::{
    ArmId, BlindingError, BlindingResult, BreachId, ParticipantId, RequestId, StudyId, Timestamp,
    UserId,
};
use super::value_objects::{
    AccessLevel, ApprovalStatus, AuditDetails, BlindingLevel, BreachSeverity, BreachType,
    RandomizationMethod, RoleName, StudyStatus,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Participant attribute map supplied by the participant directory.
pub type ParticipantAttributes = BTreeMap<String, String>;

/// One treatment or control group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arm {
    /// Arm identifier.
    pub id: ArmId,
    /// Display name.
    pub name: String,
    /// Internal code, never shown to blinded roles.
    pub internal_code: String,
    /// Target enrollment.
    pub target_size: usize,
    /// Control arm.
    pub is_control: bool,
    /// Placebo arm.
    pub is_placebo: bool,
}

impl Arm {
    /// Create an active-treatment arm.
    pub fn new(id: &str, name: &str, internal_code: &str, target_size: usize) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            internal_code: internal_code.to_string(),
            target_size,
            is_control: false,
            is_placebo: false,
        }
    }

    /// Mark as a placebo control arm.
    pub fn placebo(mut self) -> Self {
        self.is_control = true;
        self.is_placebo = true;
        self
    }
}

/// Enrolled participant, linked to an arm through a blinded id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindedParticipant {
    /// External participant identifier.
    pub participant_id: ParticipantId,
    /// Identifier shown to blinded roles.
    pub blinded_id: String,
    /// Assigned arm.
    pub arm_id: ArmId,
    /// Enrollment timestamp.
    pub enrolled_at: Timestamp,
    /// Soft-withdrawal timestamp.
    pub withdrawn_at: Option<Timestamp>,
    /// Reason given on withdrawal.
    pub withdrawal_reason: Option<String>,
    /// Data partitions this participant's records belong to.
    pub data_partitions: Vec<String>,
}

impl BlindedParticipant {
    /// Not withdrawn.
    pub fn is_active(&self) -> bool {
        self.withdrawn_at.is_none()
    }

    /// Shares at least one partition with `partitions`.
    pub fn visible_in(&self, partitions: &[String]) -> bool {
        self.data_partitions.iter().any(|p| partitions.contains(p))
    }
}

/// A user's role within one study.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyRole {
    /// Role holder.
    pub user_id: UserId,
    /// Role name.
    pub role: RoleName,
    /// Visibility.
    pub access_level: AccessLevel,
    /// Partitions this role may see.
    pub data_partitions: Vec<String>,
    /// May see or approve disclosure of assignments.
    pub can_unblind: bool,
    /// Unblinding requests by this role need an approver.
    pub approval_required: bool,
    /// Users notified when this role requests unblinding.
    pub approvers: Vec<UserId>,
    /// When the role was granted.
    pub assigned_at: Timestamp,
}

impl StudyRole {
    /// Create a role with no unblinding rights.
    pub fn new(user_id: &str, role: RoleName, access_level: AccessLevel) -> Self {
        Self {
            user_id: user_id.to_string(),
            role,
            access_level,
            data_partitions: Vec::new(),
            can_unblind: false,
            approval_required: true,
            approvers: Vec::new(),
            assigned_at: 0,
        }
    }

    /// Grant unblinding authority. With `requires_approval` set, every
    /// emergency request from this role waits for an approver.
    pub fn with_unblinding_authority(mut self, requires_approval: bool) -> Self {
        self.can_unblind = true;
        self.approval_required = requires_approval;
        self
    }

    /// Restrict to partitions.
    pub fn with_partitions(mut self, partitions: &[&str]) -> Self {
        self.data_partitions = partitions.iter().map(|p| p.to_string()).collect();
        self
    }

    /// Name explicit approvers.
    pub fn with_approvers(mut self, approvers: &[&str]) -> Self {
        self.approvers = approvers.iter().map(|a| a.to_string()).collect();
        self
    }

    /// Holds `full_access`.
    pub fn is_full_access(&self) -> bool {
        self.access_level == AccessLevel::FullAccess
    }

    /// Holds `full_access` and `can_unblind`.
    pub fn is_authorized_unblinder(&self) -> bool {
        self.is_full_access() && self.can_unblind
    }
}

/// Emergency unblinding request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnblindingRequest {
    /// Request id.
    pub id: RequestId,
    /// Participant to unblind.
    pub participant_id: ParticipantId,
    /// Requesting user.
    pub requested_by: UserId,
    /// Justification.
    pub reason: String,
    /// Approval outcome.
    pub status: ApprovalStatus,
    /// Resolving user (or the requester when auto-approved).
    pub approved_by: Option<UserId>,
    /// Reason given for denial.
    pub denial_reason: Option<String>,
    /// Request timestamp.
    pub requested_at: Timestamp,
    /// Resolution timestamp.
    pub resolved_at: Option<Timestamp>,
}

/// Recorded blinding breach.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breach {
    /// Breach id.
    pub id: BreachId,
    /// Kind of breach.
    pub breach_type: BreachType,
    /// Severity.
    pub severity: BreachSeverity,
    /// Free-form description.
    pub description: String,
    /// Participants whose assignment was exposed.
    pub affected_participants: Vec<ParticipantId>,
    /// Researchers who learned the assignment.
    pub affected_researchers: Vec<UserId>,
    /// Who reported it.
    pub reported_by: UserId,
    /// When it happened.
    pub occurred_at: Timestamp,
    /// When it was recorded.
    pub reported_at: Timestamp,
    /// Resolution, once resolved.
    pub resolution: Option<BreachResolution>,
}

/// Resolution attached to a breach.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreachResolution {
    /// Corrective action taken.
    pub action_taken: String,
    /// Resolving user.
    pub resolved_by: UserId,
    /// Resolution timestamp.
    pub resolved_at: Timestamp,
}

/// Caller-supplied breach report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreachReport {
    /// Kind of breach.
    pub breach_type: BreachType,
    /// Severity.
    pub severity: BreachSeverity,
    /// Description.
    pub description: String,
    /// Exposed participants.
    pub affected_participants: Vec<ParticipantId>,
    /// Researchers who learned assignments.
    pub affected_researchers: Vec<UserId>,
    /// When it happened (defaults to now).
    pub occurred_at: Option<Timestamp>,
}

/// Append-only audit log entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Entry id.
    pub id: String,
    /// When the action was committed.
    pub timestamp: Timestamp,
    /// Action name.
    pub action: String,
    /// User whose request produced the entry. Engine-generated entries keep
    /// the triggering user and set `system_generated`.
    pub actor: UserId,
    /// Structured payload.
    pub details: AuditDetails,
    /// Participants affected by the action.
    pub participant_ids: Option<Vec<ParticipantId>>,
    /// Generated by the engine rather than requested by a user.
    pub system_generated: bool,
}

/// Weighted minimization factor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MinimizationFactor {
    /// Attribute name looked up in the participant directory.
    pub name: String,
    /// Weight applied to matching counts.
    pub weight: f64,
}

/// Randomization strategy configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
pub struct RandomizationConfig {
    /// Strategy.
    pub method: RandomizationMethod,
    /// Per-arm allocation ratio, in arm order (default equal).
    pub allocation_ratio: Option<Vec<u32>>,
    /// Block size for block randomization (default `2 × arm count`).
    pub block_size: Option<usize>,
    /// Attribute names forming the stratum key.
    pub stratification_factors: Vec<String>,
    /// Factors balanced by minimization.
    pub minimization_factors: Vec<MinimizationFactor>,
}

impl RandomizationConfig {
    /// Simple randomization with equal weights.
    pub fn simple() -> Self {
        Self::default()
    }

    /// Block randomization.
    pub fn block(block_size: Option<usize>) -> Self {
        Self {
            method: RandomizationMethod::Block,
            block_size,
            ..Self::default()
        }
    }

    /// Stratified randomization over the given attribute names.
    pub fn stratified(factors: &[&str]) -> Self {
        Self {
            method: RandomizationMethod::Stratified,
            stratification_factors: factors.iter().map(|f| f.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Adaptive randomization.
    pub fn adaptive() -> Self {
        Self {
            method: RandomizationMethod::Adaptive,
            ..Self::default()
        }
    }

    /// Minimization over weighted factors.
    pub fn minimization(factors: &[(&str, f64)]) -> Self {
        Self {
            method: RandomizationMethod::Minimization,
            minimization_factors: factors
                .iter()
                .map(|(name, weight)| MinimizationFactor {
                    name: name.to_string(),
                    weight: *weight,
                })
                .collect(),
            ..Self::default()
        }
    }

    /// Set the allocation ratio.
    pub fn with_ratio(mut self, ratio: &[u32]) -> Self {
        self.allocation_ratio = Some(ratio.to_vec());
        self
    }

    /// Normalized-later weights, one per arm.
    pub fn weights(&self, arm_count: usize) -> Vec<f64> {
        match &self.allocation_ratio {
            Some(ratio) if ratio.len() == arm_count => ratio.iter().map(|r| *r as f64).collect(),
            _ => vec![1.0; arm_count],
        }
    }

    /// Effective block size.
    pub fn block_size_for(&self, arm_count: usize) -> usize {
        self.block_size.unwrap_or(2 * arm_count)
    }

    /// Per-arm repetitions within one block, proportional to the ratio (rounded).
    pub fn block_multiplicities(&self, arm_count: usize) -> Vec<usize> {
        let weights = self.weights(arm_count);
        let total: f64 = weights.iter().sum();
        let block_size = self.block_size_for(arm_count) as f64;
        weights
            .iter()
            .map(|w| (block_size * w / total).round() as usize)
            .collect()
    }

    /// Check the configuration against the study's arms.
    pub fn validate(&self, study_id: &str, arm_count: usize) -> BlindingResult<()> {
        if let Some(ratio) = &self.allocation_ratio {
            if arm_count > 0 && ratio.len() != arm_count {
                return Err(BlindingError::invalid_params(
                    study_id,
                    "allocation_ratio",
                    format!("{} entries for {} arms", ratio.len(), arm_count),
                ));
            }
            if ratio.iter().any(|r| *r == 0) {
                return Err(BlindingError::invalid_params(
                    study_id,
                    "allocation_ratio",
                    "entries must be positive",
                ));
            }
        }

        match self.method {
            RandomizationMethod::Block => {
                if self.block_size == Some(0) {
                    return Err(BlindingError::invalid_params(
                        study_id,
                        "block_size",
                        "must be positive",
                    ));
                }
                if arm_count > 0 {
                    let per_block: usize = self.block_multiplicities(arm_count).iter().sum();
                    let block_size = self.block_size_for(arm_count);
                    if per_block != block_size {
                        return Err(BlindingError::invalid_params(
                            study_id,
                            "block_size",
                            format!(
                                "ratio allocates {} slots per block of {}",
                                per_block, block_size
                            ),
                        ));
                    }
                }
            }
            RandomizationMethod::Stratified => {
                if self.stratification_factors.is_empty() {
                    return Err(BlindingError::invalid_params(
                        study_id,
                        "stratification_factors",
                        "at least one factor is required",
                    ));
                }
            }
            RandomizationMethod::Minimization => {
                if self
                    .minimization_factors
                    .iter()
                    .any(|f| !f.weight.is_finite() || f.weight <= 0.0)
                {
                    return Err(BlindingError::invalid_params(
                        study_id,
                        "minimization_factors",
                        "weights must be positive",
                    ));
                }
            }
            RandomizationMethod::Simple | RandomizationMethod::Adaptive => {}
        }

        Ok(())
    }
}

/// Stored permuted block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSequence {
    /// Owning study.
    pub study_id: StudyId,
    /// Zero-based block number.
    pub block_number: u64,
    /// Shuffled arm ids.
    pub sequence: Vec<ArmId>,
    /// Generation timestamp.
    pub created_at: Timestamp,
}

/// Per-stratum running assignment counts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StratumCounts {
    /// Owning study.
    pub study_id: StudyId,
    /// Stratum key.
    pub stratum_id: String,
    /// Assignments per arm.
    pub counts: BTreeMap<ArmId, u64>,
}

/// Side record committed atomically with the study.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateRecord {
    /// New block sequence.
    BlockSequence(BlockSequence),
    /// Updated stratum counts.
    StratumCounts(StratumCounts),
}

/// Study creation request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StudyDefinition {
    /// Study id.
    pub id: StudyId,
    /// Title.
    pub title: String,
    /// Blinding level.
    pub blinding_level: BlindingLevel,
    /// Randomization configuration.
    pub randomization: RandomizationConfig,
    /// Arms, in allocation-ratio order.
    pub arms: Vec<Arm>,
    /// Initial roles.
    pub roles: Vec<StudyRole>,
}

/// Double-blind study aggregate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Study {
    /// Study id.
    pub id: StudyId,
    /// Title.
    pub title: String,
    /// Blinding level.
    pub blinding_level: BlindingLevel,
    /// Lifecycle status.
    pub status: StudyStatus,
    /// Randomization configuration.
    pub randomization: RandomizationConfig,
    /// Arms, in allocation-ratio order.
    pub arms: Vec<Arm>,
    /// Enrolled participants (never removed).
    pub participants: Vec<BlindedParticipant>,
    /// Role assignments.
    pub roles: Vec<StudyRole>,
    /// Emergency unblinding requests.
    pub unblinding_requests: Vec<UnblindingRequest>,
    /// Recorded breaches (append-only).
    pub breaches: Vec<Breach>,
    /// Audit log (append-only).
    pub audit_log: Vec<AuditLogEntry>,
    /// Optimistic version, +1 per committed mutation.
    pub version: u64,
    /// Creating user.
    pub created_by: UserId,
    /// Creation timestamp.
    pub created_at: Timestamp,
    /// Last mutation timestamp.
    pub updated_at: Timestamp,
}

impl Study {
    /// Look up a role holder.
    pub fn role_for(&self, user_id: &str) -> Option<&StudyRole> {
        self.roles.iter().find(|r| r.user_id == user_id)
    }

    /// The caller's role, or `InsufficientPermissions`.
    pub fn require_role(&self, user_id: &str) -> BlindingResult<&StudyRole> {
        self.role_for(user_id)
            .ok_or_else(|| BlindingError::permission(&self.id, user_id, "study role"))
    }

    /// The caller's role if it holds `full_access`.
    pub fn require_full_access(&self, user_id: &str) -> BlindingResult<&StudyRole> {
        let role = self.require_role(user_id)?;
        if !role.is_full_access() {
            return Err(BlindingError::permission(
                &self.id,
                user_id,
                AccessLevel::FullAccess.as_str(),
            ));
        }
        Ok(role)
    }

    /// Number of `full_access` role holders.
    pub fn full_access_count(&self) -> usize {
        self.roles.iter().filter(|r| r.is_full_access()).count()
    }

    /// Look up an arm.
    pub fn arm(&self, arm_id: &str) -> Option<&Arm> {
        self.arms.iter().find(|a| a.id == arm_id)
    }

    /// Arm ids in allocation order.
    pub fn arm_ids(&self) -> Vec<ArmId> {
        self.arms.iter().map(|a| a.id.clone()).collect()
    }

    /// Look up an enrolled participant.
    pub fn participant(&self, participant_id: &str) -> Option<&BlindedParticipant> {
        self.participants
            .iter()
            .find(|p| p.participant_id == participant_id)
    }

    /// Enrolled participant, or `ParticipantNotFound`.
    pub fn require_participant(&self, participant_id: &str) -> BlindingResult<&BlindedParticipant> {
        self.participant(participant_id)
            .ok_or_else(|| BlindingError::participant_not_found(&self.id, participant_id))
    }

    /// Participants that have not withdrawn.
    pub fn active_participants(&self) -> impl Iterator<Item = &BlindedParticipant> {
        self.participants.iter().filter(|p| p.is_active())
    }

    /// Active participants per arm, in arm order.
    pub fn active_counts(&self) -> Vec<usize> {
        self.arms
            .iter()
            .map(|arm| {
                self.active_participants()
                    .filter(|p| p.arm_id == arm.id)
                    .count()
            })
            .collect()
    }

    /// Look up an unblinding request.
    pub fn unblinding_request(&self, request_id: &str) -> Option<&UnblindingRequest> {
        self.unblinding_requests.iter().find(|r| r.id == request_id)
    }

    /// Approved emergency unblinding requests.
    pub fn approved_unblindings(&self) -> impl Iterator<Item = &UnblindingRequest> {
        self.unblinding_requests
            .iter()
            .filter(|r| r.status == ApprovalStatus::Approved)
    }

    /// An approved emergency unblinding covers this participant.
    pub fn has_approved_unblinding(&self, participant_id: &str) -> bool {
        self.approved_unblindings()
            .any(|r| r.participant_id == participant_id)
    }

    /// Fail with `InvalidStudyState` unless `allowed` holds for the status.
    pub fn ensure_status(
        &self,
        operation: &str,
        allowed: impl Fn(StudyStatus) -> bool,
    ) -> BlindingResult<()> {
        if allowed(self.status) {
            Ok(())
        } else {
            Err(BlindingError::InvalidStudyState {
                study_id: self.id.clone(),
                status: self.status.to_string(),
                operation: operation.to_string(),
            })
        }
    }
}

/// One participant's disclosed assignment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentDisclosure {
    /// External participant id.
    pub participant_id: ParticipantId,
    /// Blinded id.
    pub blinded_id: String,
    /// True arm.
    pub arm_id: ArmId,
    /// Arm display name.
    pub arm_name: String,
    /// Withdrawn before unblinding.
    pub withdrawn: bool,
}

/// Result of the `COMPLETED → UNBLINDED` transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnblindingResult {
    /// Study id.
    pub study_id: StudyId,
    /// Unblinding user.
    pub unblinded_by: UserId,
    /// Timestamp.
    pub unblinded_at: Timestamp,
    /// Every participant's true arm.
    pub assignments: Vec<AssignmentDisclosure>,
}
