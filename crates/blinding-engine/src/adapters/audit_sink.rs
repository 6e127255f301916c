//! In-memory audit sink.

use crate::domain::{AuditLogEntry, SinkError, StudyId};
use crate::ports::outbound::AuditSink;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

/// Mirrors committed audit entries per study.
#[derive(Default)]
pub struct InMemoryAuditSink {
    entries: RwLock<HashMap<StudyId, Vec<AuditLogEntry>>>,
}

impl InMemoryAuditSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirrored entries of one study, in append order.
    pub fn entries(&self, study_id: &str) -> Vec<AuditLogEntry> {
        self.entries
            .read()
            .get(study_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn append(&self, study_id: &str, entry: &AuditLogEntry) -> Result<(), SinkError> {
        debug!("[blinding] Audit {} {} by {}", study_id, entry.action, entry.actor);
        self.entries
            .write()
            .entry(study_id.to_string())
            .or_default()
            .push(entry.clone());
        Ok(())
    }
}
