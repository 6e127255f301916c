//! Subscriber installation and structured logging macros.
//!
//! Logs carry a consistent field set so they can be filtered per study:
//! - `subsystem`: always `blinding` for engine events
//! - `study_id`: the study aggregate the event belongs to
//! - additional context fields supplied at the call site

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{TelemetryConfig, TelemetryError};

/// Install the global `tracing` subscriber described by `config`.
pub(crate) fn init_subscriber(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| TelemetryError::Config(e.to_string()))?;

    if !config.console_output {
        return tracing_subscriber::registry()
            .with(env_filter)
            .try_init()
            .map_err(|e| TelemetryError::SubscriberInit(e.to_string()));
    }

    if config.json_logs {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .try_init()
            .map_err(|e| TelemetryError::SubscriberInit(e.to_string()))
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_ansi(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::SubscriberInit(e.to_string()))
    }
}

/// Log a study-scoped event with the standard field set.
///
/// ```rust,ignore
/// log_study_event!(info, study_id, "participant enrolled", actor = %actor);
/// ```
#[macro_export]
macro_rules! log_study_event {
    ($level:ident, $study_id:expr, $msg:expr $(, $($field:tt)*)?) => {
        ::tracing::$level!(
            subsystem = "blinding",
            study_id = %$study_id,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log a blinding-integrity event (breach, unblinding) with standard fields.
#[macro_export]
macro_rules! log_integrity_event {
    ($level:ident, $study_id:expr, $msg:expr, $participant_id:expr $(, $($field:tt)*)?) => {
        ::tracing::$level!(
            subsystem = "blinding",
            study_id = %$study_id,
            participant_id = %$participant_id,
            integrity = true,
            $($($field)*,)?
            $msg
        )
    };
}
