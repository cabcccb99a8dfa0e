//! Structured telemetry initialisation for the shim.
//!
//! Diagnostics always go to stderr: stdout is the status sink, so run output
//! and server log lines stay free of tracing records. The filter comes only
//! from `log_filter` (`PHASOR_LOG_FILTER`, `--log-filter` or the
//! configuration file); `RUST_LOG` is not consulted. Targets are the
//! `phasor_*` module names, so `phasor_supervisor::session=debug` traces the
//! language server handshake without the run supervisor's noise.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use phasor_config::{Config, LogFormat};
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Handle returned when telemetry has been initialised.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Failed to parse the configured log filter expression.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Failed to install the tracing subscriber.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Configures the global tracing subscriber when invoked for the first time.
///
/// Later calls return a fresh [`TelemetryHandle`] without touching the
/// installed subscriber, so the filter and format of the first call win.
/// Telemetry is written to stderr; stdout carries the status output.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] for an invalid `log_filter` and
/// [`TelemetryError::Subscriber`] if another subscriber is already global.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(config))
        .map(|_| TelemetryHandle)
}

fn install_subscriber(config: &Config) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(config.log_filter())
        .map_err(|error| TelemetryError::Filter(error.to_string()))?;

    let builder = |filter: EnvFilter| {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_writer(io::stderr)
            .with_ansi(io::stderr().is_terminal())
            .with_timer(fmt::time::UtcTime::rfc_3339())
    };

    let subscriber: Box<dyn Subscriber + Send + Sync> = match config.log_format() {
        LogFormat::Json => Box::new(builder(filter).json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder(filter).compact().finish()),
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)?;
    tracing::debug!(
        target: "phasor_cli::telemetry",
        filter = config.log_filter(),
        format = %config.log_format(),
        "telemetry installed"
    );
    Ok(())
}
