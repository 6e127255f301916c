//! # Trial Telemetry
//!
//! Logging bootstrap for the Blind-Trial engine.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use trial_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let _guard = init_telemetry(TelemetryConfig::from_env()).expect("telemetry");
//!     // Engine events are now emitted through `tracing`
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OTEL_SERVICE_NAME` | `blind-trial` | Service name in log lines |
//! | `BT_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `BT_JSON_LOGS` | `false` | JSON formatted output |
//! | `BT_CONSOLE_OUTPUT` | `true` | Write logs to stdout |

#![warn(missing_docs)]

mod config;
mod logging;

pub use config::TelemetryConfig;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The global subscriber could not be installed (usually: already set).
    #[error("Failed to install tracing subscriber: {0}")]
    SubscriberInit(String),

    /// The log filter could not be parsed.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize the logging stack.
///
/// Returns a guard that should be held for the lifetime of the application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    logging::init_subscriber(&config)?;

    tracing::info!(
        service = %config.service_name,
        json_logs = config.json_logs,
        "Telemetry initialized"
    );

    Ok(TelemetryGuard {
        service_name: config.service_name,
    })
}

/// Install a test subscriber, ignoring the error when one is already set.
///
/// Safe to call from every test; only the first call wins.
pub fn init_test_telemetry() {
    let _ = logging::init_subscriber(&TelemetryConfig::for_testing());
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    service_name: String,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry...");
    }
}
