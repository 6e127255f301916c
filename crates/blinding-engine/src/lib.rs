//! # Blinding Engine
//!
//! Randomization and blinding enforcement for double-blind studies.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//! **Persistence:** pluggable [`StudyStore`] with optimistic concurrency
//! **Status:** Production-Ready
//!
//! ## Purpose
//!
//! Keep treatment assignments hidden from everyone who must not see them:
//! - Five randomization strategies (simple, block, stratified, adaptive, minimization)
//! - Study lifecycle state machine with a one-way unblinding event
//! - Access-level projection of every study read
//! - Emergency unblinding with approval, plus breach registration
//! - Append-only audit log and derived integrity metrics
//!
//! ## Access Levels
//!
//! | Level | Sees |
//! |-------|------|
//! | `full_access` | Everything |
//! | `blinded_access` | Participants in its partitions, arm ids masked |
//! | `aggregated_only` | Arm definitions and lifecycle audit entries |
//! | `metadata_only` | Study metadata and roles |
//!
//! ## Module Structure
//!
//! ```text
//! blinding-engine/
//! ├── domain/          # Study aggregate, state machine, invariants, errors
//! ├── algorithms/      # Randomization strategies and dispatch
//! ├── enforcement/     # Projection, roster, unblinding, breaches
//! ├── audit/           # Audit action catalogue and integrity metrics
//! ├── ports/           # API trait + store/sink/clock traits
//! ├── adapters/        # In-memory store, directory and sinks
//! ├── config.rs        # Engine configuration
//! └── service.rs       # Coordinator: commit, retry, notify
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod audit;
pub mod config;
pub mod domain;
pub mod enforcement;
pub mod ports;
pub mod service;

// Re-exports
pub use adapters::{
    InMemoryAuditSink, InMemoryParticipantDirectory, InMemoryStudyStore,
    RecordingNotificationSink, TracingNotificationSink,
};
pub use algorithms::{assign, stratum_key, ArmAssignment, AssignmentInput};
pub use audit::{actions, compute_integrity, IntegrityReport};
pub use config::BlindingConfig;
pub use domain::{
    AccessLevel, ApprovalStatus, Arm, AuditDetails, AuditLogEntry, BlindedParticipant,
    BlindingError, BlindingLevel, BlindingResult, BlockSequence, Breach, BreachReport,
    BreachSeverity, BreachType, DetailValue, MinimizationFactor, ParticipantAttributes,
    RandomizationConfig, RandomizationMethod, RoleName, SinkError, StatusTransition,
    StoreError, StratumCounts, Study, StudyDefinition, StudyRole, StudyStatus, Timestamp,
    UnblindingRequest, UnblindingResult,
};
pub use enforcement::{project, AssignmentAccess, EnrollmentReceipt, UnblindingDecision};
pub use ports::{
    AuditSink, BlindingApi, MockTimeSource, NotificationSink, ParticipantDirectory, StudyStore,
    SystemTimeSource, TimeSource,
};
pub use service::BlindingService;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
