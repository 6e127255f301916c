//! # View Projection
//!
//! Redacts a study snapshot for the caller's access level.
//!
//! | Access level | Arms | Participants | Audit log | Breaches / requests |
//! |--------------|------|--------------|-----------|---------------------|
//! | `full_access` | as stored | as stored | as stored | as stored |
//! | `blinded_access` | codes masked | arm links masked | sensitive entries removed | hidden |
//! | `aggregated_only` | as stored | none | lifecycle events only | hidden |
//! | `metadata_only` | none | none | none | hidden |
//!
//! Below `full_access` the remaining participants are also filtered to those
//! sharing a data partition with the role.

use crate::audit::{is_lifecycle, is_sensitive};
use crate::domain::{AccessLevel, Study, StudyRole};

/// Replacement for masked arm codes and arm links.
pub const DEFAULT_SENTINEL: &str = "BLINDED";

/// Redacted copy of `study` as seen by `role`.
///
/// Projecting an already projected study with the same role is a no-op.
pub fn project(study: &Study, role: &StudyRole, sentinel: &str) -> Study {
    let mut view = study.clone();

    match role.access_level {
        AccessLevel::FullAccess => return view,
        AccessLevel::BlindedAccess => {
            for arm in &mut view.arms {
                arm.internal_code = sentinel.to_string();
            }
            for participant in &mut view.participants {
                participant.arm_id = sentinel.to_string();
            }
            view.audit_log.retain(|entry| !is_sensitive(entry));
        }
        AccessLevel::AggregatedOnly => {
            view.participants.clear();
            view.audit_log.retain(is_lifecycle);
        }
        AccessLevel::MetadataOnly => {
            view.arms.clear();
            view.participants.clear();
            view.audit_log.clear();
        }
    }

    view.breaches.clear();
    view.unblinding_requests.clear();
    view.participants
        .retain(|p| p.visible_in(&role.data_partitions));

    view
}
