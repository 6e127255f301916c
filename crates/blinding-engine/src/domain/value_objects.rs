//! # Domain Value Objects
//!
//! Immutable value types for the blinding engine: lifecycle status, access
//! levels, randomization methods and the structured audit payload.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How many participant classes are denied knowledge of arm assignment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlindingLevel {
    /// Participants are blinded.
    Single,
    /// Participants and investigators are blinded.
    #[default]
    Double,
    /// Participants, investigators and analysts are blinded.
    Triple,
}

/// Study lifecycle state machine.
///
/// ```text
/// SETUP ──→ ACTIVE ⇄ PAUSED
///             │        │
///             └──→ COMPLETED ──→ UNBLINDED
///
/// any non-terminal ──→ TERMINATED
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StudyStatus {
    /// Initial state - arms and roles configured, enrollment allowed.
    #[default]
    Setup,
    /// Enrolling and running.
    Active,
    /// Temporarily halted.
    Paused,
    /// Follow-up finished, still blinded.
    Completed,
    /// Assignments disclosed to the study team.
    Unblinded,
    /// Stopped early.
    Terminated,
}

impl StudyStatus {
    /// Check if transition to next state is valid.
    pub fn can_transition_to(&self, next: StudyStatus) -> bool {
        match (self, next) {
            (from, Self::Terminated) => !from.is_terminal(),
            (Self::Setup, Self::Active) => true,
            (Self::Active, Self::Paused) => true,
            (Self::Paused, Self::Active) => true,
            (Self::Active, Self::Completed) => true,
            (Self::Paused, Self::Completed) => true,
            (Self::Completed, Self::Unblinded) => true,
            _ => false,
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Unblinded | Self::Terminated)
    }

    /// Whether new participants may be enrolled.
    pub fn accepts_enrollment(&self) -> bool {
        matches!(self, Self::Setup | Self::Active)
    }

    /// Upper-case wire name, as recorded in audit details.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Setup => "SETUP",
            Self::Active => "ACTIVE",
            Self::Paused => "PAUSED",
            Self::Completed => "COMPLETED",
            Self::Unblinded => "UNBLINDED",
            Self::Terminated => "TERMINATED",
        }
    }
}

impl fmt::Display for StudyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visibility granted to a role holder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    /// Sees everything.
    FullAccess,
    /// Sees participants but not their arms.
    BlindedAccess,
    /// Sees arm and study metadata only.
    AggregatedOnly,
    /// Sees top-level study metadata only.
    MetadataOnly,
}

impl AccessLevel {
    /// Snake-case name used in error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FullAccess => "full_access",
            Self::BlindedAccess => "blinded_access",
            Self::AggregatedOnly => "aggregated_only",
            Self::MetadataOnly => "metadata_only",
        }
    }
}

/// Role name within a study team.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleName {
    /// Principal investigator.
    PrincipalInvestigator,
    /// Researcher.
    Researcher,
    /// Data analyst.
    Analyst,
    /// Statistician.
    Statistician,
    /// Study coordinator.
    Coordinator,
    /// Ethics monitor.
    EthicsMonitor,
}

impl RoleName {
    /// Snake-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrincipalInvestigator => "principal_investigator",
            Self::Researcher => "researcher",
            Self::Analyst => "analyst",
            Self::Statistician => "statistician",
            Self::Coordinator => "coordinator",
            Self::EthicsMonitor => "ethics_monitor",
        }
    }
}

/// Randomization strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RandomizationMethod {
    /// Weighted uniform draw.
    #[default]
    Simple,
    /// Permuted blocks.
    Block,
    /// Balance within strata.
    Stratified,
    /// Steer toward target proportions.
    Adaptive,
    /// Pocock-Simon style minimization.
    Minimization,
}

impl RandomizationMethod {
    /// Snake-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Block => "block",
            Self::Stratified => "stratified",
            Self::Adaptive => "adaptive",
            Self::Minimization => "minimization",
        }
    }
}

/// Outcome of an emergency unblinding request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// Awaiting an approver.
    #[default]
    Pending,
    /// Disclosure granted.
    Approved,
    /// Disclosure refused.
    Denied,
}

impl ApprovalStatus {
    /// Approved and denied requests are immutable.
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Kind of blinding breach.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreachType {
    /// Arm disclosed by mistake.
    AccidentalDisclosure,
    /// Arm inferred from other data.
    DeductiveDisclosure,
    /// System fault exposed assignments.
    TechnicalError,
    /// Protocol not followed.
    ProtocolViolation,
    /// Approved emergency unblinding.
    EmergencyUnblinding,
}

/// Breach severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreachSeverity {
    /// Minor.
    Low,
    /// Moderate.
    Medium,
    /// Major.
    High,
    /// Study integrity at risk; all full-access holders are notified.
    Critical,
}

/// Primitive-typed audit/notification payload value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum DetailValue {
    /// Text.
    Text(String),
    /// Signed integer.
    Integer(i64),
    /// Floating point.
    Float(f64),
    /// Boolean.
    Bool(bool),
    /// List of strings.
    List(Vec<String>),
}

impl DetailValue {
    /// Borrow the text payload, if this is a `Text` value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for DetailValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for DetailValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for DetailValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<u64> for DetailValue {
    fn from(value: u64) -> Self {
        Self::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<usize> for DetailValue {
    fn from(value: usize) -> Self {
        Self::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for DetailValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for DetailValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<String>> for DetailValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

/// Key-ordered structured payload.
pub type AuditDetails = BTreeMap<String, DetailValue>;

/// Build an [`AuditDetails`] map from literal pairs.
pub fn details<const N: usize>(pairs: [(&str, DetailValue); N]) -> AuditDetails {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}
