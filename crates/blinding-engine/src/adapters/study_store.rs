//! In-memory study store.
//!
//! Implements `StudyStore` with a single lock over studies, block sequences
//! and stratum counts so that a study commit and its side records land
//! together.

use crate::domain::{
    AggregateRecord, BlockSequence, StoreError, StratumCounts, Study, StudyId,
};
use crate::ports::outbound::StudyStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

#[derive(Default)]
struct StoreState {
    studies: HashMap<StudyId, Study>,
    blocks: HashMap<(StudyId, u64), BlockSequence>,
    strata: HashMap<(StudyId, String), StratumCounts>,
}

impl StoreState {
    fn apply(&mut self, record: AggregateRecord) {
        match record {
            AggregateRecord::BlockSequence(sequence) => {
                self.blocks
                    .insert((sequence.study_id.clone(), sequence.block_number), sequence);
            }
            AggregateRecord::StratumCounts(counts) => {
                self.strata
                    .insert((counts.study_id.clone(), counts.stratum_id.clone()), counts);
            }
        }
    }
}

/// In-memory study store.
#[derive(Default)]
pub struct InMemoryStudyStore {
    state: RwLock<StoreState>,
    /// Updates still to be rejected with a version conflict.
    injected_conflicts: AtomicUsize,
}

impl InMemoryStudyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next `count` updates with a version conflict.
    pub fn inject_conflicts(&self, count: usize) {
        self.injected_conflicts.store(count, Ordering::SeqCst);
    }

    /// Number of stored studies.
    pub fn study_count(&self) -> usize {
        self.state.read().studies.len()
    }

    fn take_injected_conflict(&self) -> bool {
        self.injected_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl StudyStore for InMemoryStudyStore {
    async fn get_study(&self, study_id: &str) -> Result<Option<Study>, StoreError> {
        Ok(self.state.read().studies.get(study_id).cloned())
    }

    async fn save_study(&self, study: Study) -> Result<(), StoreError> {
        let mut state = self.state.write();
        if state.studies.contains_key(&study.id) {
            return Err(StoreError::AlreadyExists(study.id));
        }
        debug!("[blinding] Stored new study {} at version {}", study.id, study.version);
        state.studies.insert(study.id.clone(), study);
        Ok(())
    }

    async fn update_study(
        &self,
        study: Study,
        expected_version: u64,
        records: Vec<AggregateRecord>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write();
        let actual = state
            .studies
            .get(&study.id)
            .map(|s| s.version)
            .ok_or_else(|| StoreError::StudyNotFound(study.id.clone()))?;

        if self.take_injected_conflict() {
            return Err(StoreError::VersionConflict {
                study_id: study.id,
                expected: expected_version,
                actual: actual + 1,
            });
        }

        if actual != expected_version {
            return Err(StoreError::VersionConflict {
                study_id: study.id,
                expected: expected_version,
                actual,
            });
        }

        debug!(
            "[blinding] Committed study {} v{} -> v{} with {} side record(s)",
            study.id,
            actual,
            study.version,
            records.len()
        );
        for record in records {
            state.apply(record);
        }
        state.studies.insert(study.id.clone(), study);
        Ok(())
    }

    async fn get_block_sequence(
        &self,
        study_id: &str,
        block_number: u64,
    ) -> Result<Option<BlockSequence>, StoreError> {
        Ok(self
            .state
            .read()
            .blocks
            .get(&(study_id.to_string(), block_number))
            .cloned())
    }

    async fn store_block_sequence(&self, sequence: BlockSequence) -> Result<(), StoreError> {
        self.state
            .write()
            .apply(AggregateRecord::BlockSequence(sequence));
        Ok(())
    }

    async fn get_stratum_counts(
        &self,
        study_id: &str,
        stratum_id: &str,
    ) -> Result<Option<StratumCounts>, StoreError> {
        Ok(self
            .state
            .read()
            .strata
            .get(&(study_id.to_string(), stratum_id.to_string()))
            .cloned())
    }

    async fn store_stratum_counts(&self, counts: StratumCounts) -> Result<(), StoreError> {
        self.state
            .write()
            .apply(AggregateRecord::StratumCounts(counts));
        Ok(())
    }
}
