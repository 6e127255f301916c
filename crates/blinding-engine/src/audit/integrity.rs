//! # Integrity Metrics
//!
//! Derives a blinding-integrity score and data-sharing risk from the study's
//! breaches, unblinding requests and audit log.
//!
//! ```text
//! score = clamp(100 - 10·confirmed - 2·potential - 5·approved_emergency, 0, 100)
//! risk  = min(100, 2·roles + min(20, participants / 5) + 5·confirmed + 3·approved_emergency)
//! ```

use super::log::{assignment_access_counts, is_suspicious};
use crate::domain::Study;
use serde::{Deserialize, Serialize};

/// Score below which the study is considered compromised.
pub const SCORE_THRESHOLD: f64 = 70.0;

/// Potential breaches above which staff behaviour is reviewed.
pub const POTENTIAL_BREACH_THRESHOLD: usize = 3;

/// Risk above which data sharing is tightened.
pub const RISK_THRESHOLD: f64 = 50.0;

/// Default number of reads of one participant by one actor before it counts.
pub const DEFAULT_REPEATED_ACCESS_THRESHOLD: usize = 5;

const COMPROMISED: [&str; 2] = [
    "Blinding integrity is compromised: convene the data monitoring committee \
     for a full blinding review.",
    "Restrict assignment lookups to authorized unblinders until the review is complete.",
];

const CONFIRMED: [&str; 2] = [
    "Document corrective action for every recorded breach.",
    "Assess whether exposed researchers must be removed from outcome assessment.",
];

const SUSPICIOUS: [&str; 2] = [
    "Review audit entries for repeated or unexplained assignment access.",
    "Retrain study staff on blinding procedures.",
];

const RISKY: [&str; 2] = [
    "Reduce the number of roles with participant-level access.",
    "Narrow the data partitions granted to blinded roles.",
];

/// Integrity assessment of one study.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntegrityReport {
    /// 0 (compromised) to 100 (intact).
    pub score: f64,
    /// Suspicious audit entries plus repeatedly accessed participants.
    pub potential_breaches: usize,
    /// Recorded breaches.
    pub confirmed_breaches: usize,
    /// Approved emergency unblindings.
    pub approved_emergency_unblindings: usize,
    /// 0 to 100.
    pub data_sharing_risk: f64,
    /// Advisory strings for every triggered rule.
    pub recommendations: Vec<String>,
}

/// Compute the integrity report.
///
/// `repeated_access_threshold` is the number of assignment reads of one
/// participant by one actor that may happen before the pair counts as a
/// potential breach.
pub fn compute_integrity(study: &Study, repeated_access_threshold: usize) -> IntegrityReport {
    let suspicious_entries = study.audit_log.iter().filter(|e| is_suspicious(e)).count();
    let repeated_access = assignment_access_counts(&study.audit_log)
        .values()
        .filter(|count| **count > repeated_access_threshold)
        .count();

    let potential_breaches = suspicious_entries + repeated_access;
    let confirmed_breaches = study.breaches.len();
    let approved_emergency_unblindings = study.approved_unblindings().count();

    let score = (100.0
        - 10.0 * confirmed_breaches as f64
        - 2.0 * potential_breaches as f64
        - 5.0 * approved_emergency_unblindings as f64)
        .clamp(0.0, 100.0);

    let participant_share = (study.participants.len() as f64 / 5.0).min(20.0);
    let data_sharing_risk = (2.0 * study.roles.len() as f64
        + participant_share
        + 5.0 * confirmed_breaches as f64
        + 3.0 * approved_emergency_unblindings as f64)
        .min(100.0);

    let mut recommendations = Vec::new();
    let mut advise = |triggered: bool, catalogue: &[&str]| {
        if triggered {
            recommendations.extend(catalogue.iter().map(|s| s.to_string()));
        }
    };
    advise(score < SCORE_THRESHOLD, &COMPROMISED[..]);
    advise(confirmed_breaches > 0, &CONFIRMED[..]);
    advise(potential_breaches > POTENTIAL_BREACH_THRESHOLD, &SUSPICIOUS[..]);
    advise(data_sharing_risk > RISK_THRESHOLD, &RISKY[..]);

    IntegrityReport {
        score,
        potential_breaches,
        confirmed_breaches,
        approved_emergency_unblindings,
        data_sharing_risk,
        recommendations,
    }
}
