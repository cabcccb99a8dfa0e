//! Error types for the shim runtime.

use std::io;
use std::sync::Arc;

use phasor_supervisor::{SessionError, WatchError};
use thiserror::Error;

use crate::telemetry::TelemetryError;

/// Failures that end a `phasor-shim` invocation.
///
/// Run and session failures the user has already been notified about are
/// reported through the exit code instead.
#[derive(Debug, Error)]
pub enum AppError {
    /// The command line could not be parsed.
    #[error("{0}")]
    CliUsage(clap::Error),
    /// Configuration layers could not be loaded or merged.
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    /// Telemetry could not be installed.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    /// The async runtime could not be built.
    #[error("failed to start the async runtime: {0}")]
    Runtime(#[source] io::Error),
    /// The current directory could not be determined for the workspace root.
    #[error("failed to determine the workspace root: {0}")]
    WorkingDirectory(#[source] io::Error),
    /// The source watcher could not be started.
    #[error("failed to watch Phasor sources: {0}")]
    Watch(#[from] WatchError),
    /// The language server session could not be shut down.
    #[error("language server session failed: {0}")]
    Session(#[from] SessionError),
}
