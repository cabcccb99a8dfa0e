//! Configuration for a language server session.

use std::path::PathBuf;
use std::time::Duration;

use lsp_types::TraceValue;
use phasor_config::{Config, TraceLevel};

use crate::resolver::ExecutableSpec;

/// Default bound on the spawn and the initialisation handshake.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bound on the `shutdown` request.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Default wait for the server to exit on its own before it is killed.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(200);

/// Settings for spawning and talking to the language server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Executable name or path of the server.
    pub executable: ExecutableSpec,
    /// Arguments passed to the server.
    pub args: Vec<String>,
    /// Workspace root; also the server's working directory.
    pub root: PathBuf,
    /// Protocol trace level sent during and after initialisation.
    pub trace: TraceLevel,
    /// Bound on the spawn and the initialisation handshake.
    pub startup_timeout: Duration,
    /// Bound on the `shutdown` request.
    pub shutdown_timeout: Duration,
    /// Wait for a voluntary exit after `exit` before killing.
    pub grace_period: Duration,
}

impl SessionConfig {
    /// Builds a configuration with default trace level and timeouts.
    #[must_use]
    pub fn new(executable: ExecutableSpec, root: impl Into<PathBuf>) -> Self {
        Self {
            executable,
            args: Vec::new(),
            root: root.into(),
            trace: TraceLevel::default(),
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    /// Builds the session configuration from user settings.
    ///
    /// A relative path-shaped server executable is anchored to the current
    /// directory, since the server is spawned inside `root`.
    #[must_use]
    pub fn from_config(config: &Config, root: impl Into<PathBuf>) -> Self {
        Self::new(ExecutableSpec::new(config.lsp_path()).anchored(), root)
            .with_args(config.lsp_args().to_vec())
            .with_trace(config.trace_server())
    }

    /// Sets the server arguments.
    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Sets the trace level.
    #[must_use]
    pub const fn with_trace(mut self, trace: TraceLevel) -> Self {
        self.trace = trace;
        self
    }

    /// Sets the start-up timeout.
    #[must_use]
    pub const fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Sets the shutdown timeout.
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Sets the grace period before the server is killed.
    #[must_use]
    pub const fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }
}

/// Protocol representation of a trace level.
#[must_use]
pub const fn trace_value(level: TraceLevel) -> TraceValue {
    match level {
        TraceLevel::Off => TraceValue::Off,
        TraceLevel::Messages => TraceValue::Messages,
        TraceLevel::Verbose => TraceValue::Verbose,
    }
}
