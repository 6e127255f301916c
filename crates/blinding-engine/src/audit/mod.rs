//! # Audit Module
//!
//! Append-only audit log helpers and the integrity metrics derived from it.

pub mod integrity;
pub mod log;

pub use integrity::{compute_integrity, IntegrityReport, DEFAULT_REPEATED_ACCESS_THRESHOLD};
pub use log::{actions, assignment_access_counts, is_lifecycle, is_sensitive, is_suspicious};
