//! Notification sinks.

use crate::domain::{AuditDetails, Notification, SinkError};
use crate::ports::outbound::NotificationSink;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Keeps every delivered notification; can be switched off to simulate an
/// unavailable channel.
#[derive(Default)]
pub struct RecordingNotificationSink {
    delivered: RwLock<Vec<Notification>>,
    unavailable: AtomicBool,
}

impl RecordingNotificationSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything delivered so far.
    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered.read().clone()
    }

    /// Notifications delivered to `user_id`.
    pub fn delivered_to(&self, user_id: &str) -> Vec<Notification> {
        self.delivered
            .read()
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Make every following delivery fail.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl NotificationSink for RecordingNotificationSink {
    async fn notify(
        &self,
        user_id: &str,
        topic: &str,
        message: &str,
        data: &AuditDetails,
    ) -> Result<(), SinkError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SinkError::Unavailable("notification channel offline".to_string()));
        }
        self.delivered.write().push(Notification {
            user_id: user_id.to_string(),
            topic: topic.to_string(),
            message: message.to_string(),
            data: data.clone(),
        });
        Ok(())
    }
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotificationSink;

#[async_trait]
impl NotificationSink for TracingNotificationSink {
    async fn notify(
        &self,
        user_id: &str,
        topic: &str,
        message: &str,
        _data: &AuditDetails,
    ) -> Result<(), SinkError> {
        info!(user_id, topic, "[blinding] {}", message);
        Ok(())
    }
}
