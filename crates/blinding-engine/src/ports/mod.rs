//! # Ports Layer
//!
//! - [`inbound`]: the [`BlindingApi`] the engine exposes
//! - [`outbound`]: store, directory, sinks and clock the engine depends on

pub mod inbound;
pub mod outbound;

pub use inbound::BlindingApi;
pub use outbound::{
    AuditSink, MockTimeSource, NotificationSink, ParticipantDirectory, StudyStore,
    SystemTimeSource, TimeSource,
};
