//! In-memory participant directory.

use crate::domain::{ParticipantAttributes, ParticipantId, StoreError};
use crate::ports::outbound::ParticipantDirectory;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

/// Participant attributes held in memory.
#[derive(Default)]
pub struct InMemoryParticipantDirectory {
    attributes: RwLock<HashMap<ParticipantId, ParticipantAttributes>>,
}

impl InMemoryParticipantDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a participant's attributes.
    pub fn insert(&self, participant_id: &str, pairs: &[(&str, &str)]) {
        let attributes = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.attributes
            .write()
            .insert(participant_id.to_string(), attributes);
    }
}

#[async_trait]
impl ParticipantDirectory for InMemoryParticipantDirectory {
    async fn get_participant_attributes(
        &self,
        participant_id: &str,
    ) -> Result<ParticipantAttributes, StoreError> {
        let attributes = self.attributes.read().get(participant_id).cloned();
        if attributes.is_none() {
            debug!("[blinding] No directory entry for participant {}", participant_id);
        }
        Ok(attributes.unwrap_or_default())
    }
}
