//! Host-owned state threaded through every operation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use phasor_config::Config;

use crate::errors::RunError;
use crate::resolver::Resolver;
use crate::run::{RunInvocation, RunOutcome, RunSupervisor};
use crate::session::{ServerSession, SessionConfig};
use crate::sink::{Notifier, StatusSink};

/// Configuration plus the shared user-facing collaborators.
///
/// Created once at host start-up. Supervisors and the server session are
/// built from it on demand, so each picks up the configuration it holds.
#[derive(Clone)]
pub struct HostContext {
    config: Config,
    sink: Arc<dyn StatusSink>,
    notifier: Arc<dyn Notifier>,
}

impl HostContext {
    /// Bundles `config` with the status sink and notifier.
    #[must_use]
    pub fn new(config: Config, sink: Arc<dyn StatusSink>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            config,
            sink,
            notifier,
        }
    }

    /// Current configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Shared status sink.
    #[must_use]
    pub fn sink(&self) -> Arc<dyn StatusSink> {
        Arc::clone(&self.sink)
    }

    /// Shared notifier.
    #[must_use]
    pub fn notifier(&self) -> Arc<dyn Notifier> {
        Arc::clone(&self.notifier)
    }

    /// Builds a run supervisor honouring `clear_output_before_run`.
    #[must_use]
    pub fn run_supervisor(&self) -> RunSupervisor {
        RunSupervisor::new(Resolver::system(), self.sink(), self.notifier())
            .clear_before_run(self.config.clear_output_before_run())
    }

    /// Runs a Phasor source file with the configured JIT.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Request`] for files that are not Phasor sources
    /// and [`RunError::Configuration`] when the JIT cannot be found. The user
    /// is notified in both cases.
    pub async fn run_file(&self, file: &Path) -> Result<RunOutcome, RunError> {
        let invocation = match RunInvocation::for_file(&self.config, file) {
            Ok(invocation) => invocation,
            Err(error) => {
                self.notifier.error(&error.to_string());
                return Err(error.into());
            }
        };
        Ok(self.run_supervisor().run(&invocation).await?)
    }

    /// Builds the language server session for the workspace at `root`.
    #[must_use]
    pub fn server_session(&self, root: impl Into<PathBuf>) -> ServerSession {
        ServerSession::new(
            SessionConfig::from_config(&self.config, root),
            self.sink(),
            self.notifier(),
        )
    }
}
