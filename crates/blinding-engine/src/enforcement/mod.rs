//! # Blinding Enforcement
//!
//! Everything that decides who may see or change what:
//!
//! - [`projection`]: per-access-level redaction of a study snapshot
//! - [`roster`]: role grants and participant enrollment/withdrawal
//! - [`unblinding`]: emergency unblinding and assignment lookups
//! - [`breach`]: breach registration and resolution
//!
//! Mutating functions work on a working copy and return a
//! [`Mutation`](crate::domain::Mutation) for the coordinator to commit.

pub mod breach;
pub mod projection;
pub mod roster;
pub mod unblinding;

pub use breach::{register_breach, resolve_breach};
pub use projection::{project, DEFAULT_SENTINEL};
pub use roster::{
    add_role, enroll_participant, remove_role, require_enroller, withdraw_participant,
    EnrollmentReceipt,
};
pub use unblinding::{
    access_assignment, request_emergency_unblinding, resolve_emergency_unblinding,
    AssignmentAccess, UnblindingDecision,
};

use uuid::Uuid;

/// Fresh prefixed identifier.
pub(crate) fn new_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}
