//! # Adapters Layer (Hexagonal Architecture)
//!
//! In-memory implementations of the outbound ports, used by tests and by
//! embedders that keep studies in process.

mod audit_sink;
mod notification_sink;
mod participant_directory;
mod study_store;

pub use audit_sink::InMemoryAuditSink;
pub use notification_sink::{RecordingNotificationSink, TracingNotificationSink};
pub use participant_directory::InMemoryParticipantDirectory;
pub use study_store::InMemoryStudyStore;
