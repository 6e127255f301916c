//! # Shared Fixtures
//!
//! A two-arm study team and a service wired to in-memory adapters.

use blinding_engine::{
    AccessLevel, Arm, BlindingConfig, BlindingLevel, BlindingResult, BlindingService,
    InMemoryAuditSink, InMemoryParticipantDirectory, InMemoryStudyStore, MockTimeSource,
    RandomizationConfig, RecordingNotificationSink, RoleName, Study, StudyDefinition, StudyRole,
    StudyStatus,
};
use blinding_engine::ports::BlindingApi;
use std::sync::Arc;

/// Study id used by every scenario.
pub const STUDY_ID: &str = "trial-001";

/// Full access, may unblind without approval.
pub const PI: &str = "pi-1";
/// Full access, unblinding needs approval.
pub const COORDINATOR: &str = "coord-1";
/// Full access, no unblinding rights.
pub const STATISTICIAN: &str = "stat-1";
/// Blinded access to site A.
pub const RESEARCHER_A: &str = "res-a";
/// Blinded access to site B.
pub const RESEARCHER_B: &str = "res-b";
/// Aggregated access.
pub const ANALYST: &str = "analyst-1";
/// Metadata access.
pub const ETHICS: &str = "ethics-1";

/// Service type driven by the scenarios.
pub type TestService = BlindingService<
    InMemoryStudyStore,
    InMemoryParticipantDirectory,
    RecordingNotificationSink,
    InMemoryAuditSink,
    MockTimeSource,
>;

/// Service plus handles on its adapters.
pub struct Harness {
    /// Coordinator under test.
    pub service: Arc<TestService>,
    /// Backing store.
    pub store: Arc<InMemoryStudyStore>,
    /// Attribute source for stratification and minimization.
    pub directory: Arc<InMemoryParticipantDirectory>,
    /// Captured notifications.
    pub notifier: Arc<RecordingNotificationSink>,
    /// Mirrored audit entries.
    pub audit_sink: Arc<InMemoryAuditSink>,
    /// Manually driven clock.
    pub clock: Arc<MockTimeSource>,
}

impl Harness {
    /// Harness with the deterministic test configuration.
    pub fn new() -> Self {
        Self::with_config(BlindingConfig::for_testing())
    }

    /// Harness with an explicit configuration.
    pub fn with_config(config: BlindingConfig) -> Self {
        trial_telemetry::init_test_telemetry();

        let store = Arc::new(InMemoryStudyStore::new());
        let directory = Arc::new(InMemoryParticipantDirectory::new());
        let notifier = Arc::new(RecordingNotificationSink::new());
        let audit_sink = Arc::new(InMemoryAuditSink::new());
        let clock = Arc::new(MockTimeSource::new(1_700_000_000_000));
        let service = BlindingService::new(
            config,
            store.clone(),
            directory.clone(),
            notifier.clone(),
            audit_sink.clone(),
        )
        .with_clock(clock.clone());

        Self {
            service: Arc::new(service),
            store,
            directory,
            notifier,
            audit_sink,
            clock,
        }
    }

    /// Create the study and move it to `ACTIVE`.
    pub async fn active_study(&self, randomization: RandomizationConfig) -> BlindingResult<Study> {
        self.service
            .create_study(definition(randomization), PI)
            .await?;
        self.service
            .transition_status(STUDY_ID, StudyStatus::Active, PI)
            .await?;
        self.service.get_study_view(STUDY_ID, PI).await
    }

    /// Enroll `count` participants named `P000`, `P001`, ...
    ///
    /// Even-numbered participants belong to site A, odd ones to site B.
    pub async fn enroll_many(&self, count: usize) -> BlindingResult<()> {
        for i in 0..count {
            let site = if i % 2 == 0 { "site-a" } else { "site-b" };
            self.clock.advance(1_000);
            self.service
                .enroll_participant(STUDY_ID, &participant_id(i), vec![site.to_string()], PI)
                .await?;
        }
        Ok(())
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// Participant id for index `i`.
pub fn participant_id(i: usize) -> String {
    format!("P{:03}", i)
}

/// The study team.
pub fn roles() -> Vec<StudyRole> {
    vec![
        StudyRole::new(PI, RoleName::PrincipalInvestigator, AccessLevel::FullAccess)
            .with_unblinding_authority(false),
        StudyRole::new(COORDINATOR, RoleName::Coordinator, AccessLevel::FullAccess)
            .with_unblinding_authority(true)
            .with_approvers(&[PI]),
        StudyRole::new(STATISTICIAN, RoleName::Statistician, AccessLevel::FullAccess),
        StudyRole::new(RESEARCHER_A, RoleName::Researcher, AccessLevel::BlindedAccess)
            .with_partitions(&["site-a"]),
        StudyRole::new(RESEARCHER_B, RoleName::Researcher, AccessLevel::BlindedAccess)
            .with_partitions(&["site-b"]),
        StudyRole::new(ANALYST, RoleName::Analyst, AccessLevel::AggregatedOnly),
        StudyRole::new(ETHICS, RoleName::EthicsMonitor, AccessLevel::MetadataOnly),
    ]
}

/// Two-arm double-blind definition.
pub fn definition(randomization: RandomizationConfig) -> StudyDefinition {
    StudyDefinition {
        id: STUDY_ID.to_string(),
        title: "Hypertension dose-finding".to_string(),
        blinding_level: BlindingLevel::Double,
        randomization,
        arms: vec![
            Arm::new("A", "Active 10mg", "ACT-10", 100),
            Arm::new("B", "Placebo", "PLC-00", 100).placebo(),
        ],
        roles: roles(),
    }
}
