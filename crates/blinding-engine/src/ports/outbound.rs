//! # Outbound Ports
//!
//! External collaborators of the engine. Block sequences and stratum counts
//! belong to the study aggregate: [`StudyStore::update_study`] commits them
//! under the same version check as the study itself.

use crate::domain::{
    AggregateRecord, AuditDetails, AuditLogEntry, BlockSequence, ParticipantAttributes,
    SinkError, StoreError, StratumCounts, Study, Timestamp,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

/// Study persistence with optimistic versioning.
#[async_trait]
pub trait StudyStore: Send + Sync {
    /// Load a study.
    async fn get_study(&self, study_id: &str) -> Result<Option<Study>, StoreError>;

    /// Insert a new study. Fails with `AlreadyExists` if the id is taken.
    async fn save_study(&self, study: Study) -> Result<(), StoreError>;

    /// Replace a study whose stored version equals `expected_version`,
    /// together with the side records of the same mutation.
    async fn update_study(
        &self,
        study: Study,
        expected_version: u64,
        records: Vec<AggregateRecord>,
    ) -> Result<(), StoreError>;

    /// Block sequence by `(study, block number)`.
    async fn get_block_sequence(
        &self,
        study_id: &str,
        block_number: u64,
    ) -> Result<Option<BlockSequence>, StoreError>;

    /// Store a block sequence outside a study commit.
    async fn store_block_sequence(&self, sequence: BlockSequence) -> Result<(), StoreError>;

    /// Stratum counts by `(study, stratum)`.
    async fn get_stratum_counts(
        &self,
        study_id: &str,
        stratum_id: &str,
    ) -> Result<Option<StratumCounts>, StoreError>;

    /// Store stratum counts outside a study commit.
    async fn store_stratum_counts(&self, counts: StratumCounts) -> Result<(), StoreError>;
}

/// Participant attribute lookup for stratification and minimization.
#[async_trait]
pub trait ParticipantDirectory: Send + Sync {
    /// Attributes of a participant; empty when unknown.
    async fn get_participant_attributes(
        &self,
        participant_id: &str,
    ) -> Result<ParticipantAttributes, StoreError>;
}

/// Fire-and-forget notification delivery.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver one message.
    async fn notify(
        &self,
        user_id: &str,
        topic: &str,
        message: &str,
        data: &AuditDetails,
    ) -> Result<(), SinkError>;
}

/// External mirror of committed audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append a committed entry.
    async fn append(&self, study_id: &str, entry: &AuditLogEntry) -> Result<(), SinkError>;
}

/// Time source for consistent timestamp handling.
///
/// Abstracted to allow testing with deterministic time.
pub trait TimeSource: Send + Sync {
    /// Returns the current timestamp in milliseconds.
    fn now(&self) -> Timestamp;
}

/// Default system time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as Timestamp
    }
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// Manually driven clock.
#[derive(Debug, Default)]
pub struct MockTimeSource {
    time: AtomicU64,
}

impl MockTimeSource {
    /// Start at `initial`.
    pub fn new(initial: Timestamp) -> Self {
        Self {
            time: AtomicU64::new(initial),
        }
    }

    /// Move forward by `ms`.
    pub fn advance(&self, ms: u64) {
        self.time.fetch_add(ms, Ordering::SeqCst);
    }

    /// Jump to `time`.
    pub fn set(&self, time: Timestamp) {
        self.time.store(time, Ordering::SeqCst);
    }
}

impl TimeSource for MockTimeSource {
    fn now(&self) -> Timestamp {
        self.time.load(Ordering::SeqCst)
    }
}
