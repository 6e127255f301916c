//! Engine configuration.

use crate::audit::DEFAULT_REPEATED_ACCESS_THRESHOLD;
use crate::enforcement::DEFAULT_SENTINEL;
use std::env;

/// Blinding engine configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlindingConfig {
    /// Commit attempts after the first before a version conflict is returned.
    pub max_commit_retries: u32,
    /// Seed for the randomization RNG; `None` seeds from entropy.
    pub rng_seed: Option<u64>,
    /// Reads of one participant by one actor tolerated before they count
    /// as a potential breach.
    pub repeated_access_threshold: usize,
    /// Also flag assignment reads by authorized unblinders.
    pub flag_authorized_assignment_access: bool,
    /// Replacement for masked arm data in blinded views.
    pub blinded_sentinel: String,
}

impl Default for BlindingConfig {
    fn default() -> Self {
        Self {
            max_commit_retries: 5,
            rng_seed: None,
            repeated_access_threshold: DEFAULT_REPEATED_ACCESS_THRESHOLD,
            flag_authorized_assignment_access: false,
            blinded_sentinel: DEFAULT_SENTINEL.to_string(),
        }
    }
}

impl BlindingConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `BT_MAX_COMMIT_RETRIES`: optimistic commit retries (default: 5)
    /// - `BT_RNG_SEED`: fixed RNG seed (default: entropy)
    /// - `BT_REPEATED_ACCESS_THRESHOLD`: repeated-access tolerance (default: 5)
    /// - `BT_FLAG_AUTHORIZED_ACCESS`: flag unblinder reads too (default: false)
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_commit_retries: env::var("BT_MAX_COMMIT_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_commit_retries),

            rng_seed: env::var("BT_RNG_SEED").ok().and_then(|v| v.parse().ok()),

            repeated_access_threshold: env::var("BT_REPEATED_ACCESS_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.repeated_access_threshold),

            flag_authorized_assignment_access: env::var("BT_FLAG_AUTHORIZED_ACCESS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(defaults.flag_authorized_assignment_access),

            blinded_sentinel: defaults.blinded_sentinel,
        }
    }

    /// Deterministic configuration for tests.
    pub fn for_testing() -> Self {
        Self {
            rng_seed: Some(42),
            ..Self::default()
        }
    }
}
