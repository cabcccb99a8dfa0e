//! Single-file runs of the Phasor JIT.
//!
//! A [`RunSupervisor`] resolves the configured executable, spawns it once
//! for the target file, captures both output streams and reports exactly one
//! terminal outcome to the shared status sink. Resolution strictly precedes
//! the spawn; a missing executable never reaches the process layer.

mod command;

use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::Arc;

use phasor_config::{Config, SOURCE_EXTENSION};
use tracing::{debug, info, warn};

pub use self::command::{CommandLine, SpawnStrategy, UnquotableArgument};
use crate::errors::{ConfigurationError, ExecutableRole, RunRequestError};
use crate::resolver::{CommandLookup, ExecutableSpec, HostPlatform, Resolver, SystemLookup};
use crate::sink::{NotificationAction, Notifier, StatusSink};

/// Log target for run supervision.
const RUN_TARGET: &str = "phasor_supervisor::run";

/// Separator written around captured output.
pub const SEPARATOR: &str = "---";

/// Marker written before captured standard error.
pub const ERROR_OUTPUT_MARKER: &str = "Error output:";

/// Terminal line for a clean exit.
pub const SUCCESS_MARKER: &str = "Execution completed successfully";

/// Exit code reported when the child was terminated without one.
pub const UNKNOWN_EXIT_CODE: i32 = -1;

/// One requested execution of a Phasor source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInvocation {
    executable: ExecutableSpec,
    arguments: Vec<String>,
    target_file: PathBuf,
    working_directory: PathBuf,
}

impl RunInvocation {
    /// Describes a run of `executable` with `arguments` on `target_file`.
    #[must_use]
    pub const fn new(
        executable: ExecutableSpec,
        arguments: Vec<String>,
        target_file: PathBuf,
        working_directory: PathBuf,
    ) -> Self {
        Self {
            executable,
            arguments,
            target_file,
            working_directory,
        }
    }

    /// Builds the run of `file` requested from the host.
    ///
    /// The executable and arguments come from `config`. Relative paths, for
    /// the file and for a path-shaped executable, are anchored to the current
    /// directory because the child starts in the file's parent.
    ///
    /// # Errors
    ///
    /// Rejects files without the `.phs` extension, relative paths when the
    /// current directory is unavailable, and paths with no parent.
    pub fn for_file(config: &Config, file: impl Into<PathBuf>) -> Result<Self, RunRequestError> {
        let requested = file.into();
        if requested.extension().and_then(|ext| ext.to_str()) != Some(SOURCE_EXTENSION) {
            return Err(RunRequestError::NotPhasorSource { path: requested });
        }
        let target_file = match std::path::absolute(&requested) {
            Ok(path) => path,
            Err(error) => {
                return Err(RunRequestError::UnresolvablePath {
                    path: requested,
                    reason: error.to_string(),
                });
            }
        };
        let Some(working_directory) = target_file.parent().map(Path::to_path_buf) else {
            return Err(RunRequestError::NoParentDirectory { path: target_file });
        };
        Ok(Self::new(
            ExecutableSpec::new(config.jit_path()).anchored(),
            config.jit_args().to_vec(),
            target_file,
            working_directory,
        ))
    }

    /// Executable to resolve and spawn.
    #[must_use]
    pub const fn executable(&self) -> &ExecutableSpec {
        &self.executable
    }

    /// Arguments placed before the target file.
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        self.arguments.as_slice()
    }

    /// Source file being run.
    #[must_use]
    pub fn target_file(&self) -> &Path {
        self.target_file.as_path()
    }

    /// Directory the child starts in.
    #[must_use]
    pub fn working_directory(&self) -> &Path {
        self.working_directory.as_path()
    }

    /// The composed command line for this run.
    #[must_use]
    pub fn command_line(&self) -> CommandLine {
        CommandLine::compose(
            self.executable.as_str(),
            &self.arguments,
            &self.target_file,
        )
    }

    fn file_name(&self) -> String {
        self.target_file.file_name().map_or_else(
            || self.target_file.display().to_string(),
            |name| name.to_string_lossy().into_owned(),
        )
    }
}

/// Standard output and standard error captured from a child.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    /// Captured standard output, one trailing line break removed.
    pub stdout: String,
    /// Captured standard error, one trailing line break removed.
    pub stderr: String,
}

impl CapturedOutput {
    fn from_bytes(stdout: &[u8], stderr: &[u8]) -> Self {
        Self {
            stdout: trim_line_end(&String::from_utf8_lossy(stdout)).to_owned(),
            stderr: trim_line_end(&String::from_utf8_lossy(stderr)).to_owned(),
        }
    }
}

/// Terminal outcome of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The child exited with status zero.
    Succeeded {
        /// Output captured from the child.
        output: CapturedOutput,
    },
    /// The child exited with a failure status.
    FailedWithExitCode {
        /// Exit code, or [`UNKNOWN_EXIT_CODE`] when terminated by a signal.
        code: i32,
        /// Output captured before the child exited.
        output: CapturedOutput,
    },
    /// The child could not be started.
    LaunchFailed {
        /// Why the spawn failed.
        reason: String,
    },
}

impl RunOutcome {
    /// Whether the run succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    /// Output captured from the child, if it ran.
    #[must_use]
    pub const fn output(&self) -> Option<&CapturedOutput> {
        match self {
            Self::Succeeded { output } | Self::FailedWithExitCode { output, .. } => Some(output),
            Self::LaunchFailed { .. } => None,
        }
    }

    /// The single line closing the run's report.
    #[must_use]
    pub fn terminal_line(&self) -> String {
        match self {
            Self::Succeeded { .. } => String::from(SUCCESS_MARKER),
            Self::FailedWithExitCode { code, .. } => format!("Program exited with code: {code}"),
            Self::LaunchFailed { reason } => format!("Program failed to start: {reason}"),
        }
    }

    /// Notification raised for failed runs.
    #[must_use]
    pub fn failure_message(&self) -> Option<String> {
        match self {
            Self::Succeeded { .. } => None,
            Self::FailedWithExitCode { code, .. } => Some(format!(
                "Phasor execution failed: process exited with code {code}"
            )),
            Self::LaunchFailed { reason } => Some(format!("Phasor execution failed: {reason}")),
        }
    }

    fn from_output(output: &Output) -> Self {
        let captured = CapturedOutput::from_bytes(&output.stdout, &output.stderr);
        if output.status.success() {
            Self::Succeeded { output: captured }
        } else {
            Self::FailedWithExitCode {
                code: output.status.code().unwrap_or(UNKNOWN_EXIT_CODE),
                output: captured,
            }
        }
    }
}

/// Spawns single runs and reports their outcome.
pub struct RunSupervisor<L = SystemLookup> {
    resolver: Resolver<L>,
    sink: Arc<dyn StatusSink>,
    notifier: Arc<dyn Notifier>,
    clear_before_run: bool,
    platform: HostPlatform,
}

impl<L: CommandLookup> RunSupervisor<L> {
    /// Builds a supervisor reporting to `sink` and `notifier`.
    ///
    /// The sink is cleared before each run unless disabled with
    /// [`Self::clear_before_run`].
    #[must_use]
    pub fn new(
        resolver: Resolver<L>,
        sink: Arc<dyn StatusSink>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            resolver,
            sink,
            notifier,
            clear_before_run: true,
            platform: HostPlatform::current(),
        }
    }

    /// Sets whether the sink is cleared before each run.
    #[must_use]
    pub const fn clear_before_run(mut self, clear: bool) -> Self {
        self.clear_before_run = clear;
        self
    }

    /// Overrides the platform used to pick the spawn strategy.
    #[must_use]
    pub const fn with_platform(mut self, platform: HostPlatform) -> Self {
        self.platform = platform;
        self
    }

    /// Runs `invocation` to completion and reports it.
    ///
    /// Launch failures and non-zero exits are outcomes, reported to the sink
    /// and raised as error notifications.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] when the executable does not resolve.
    /// The user is notified with an open-settings action, nothing is spawned
    /// and the sink is left untouched.
    pub async fn run(&self, invocation: &RunInvocation) -> Result<RunOutcome, ConfigurationError> {
        let executable = invocation.executable();
        if !self.resolver.resolve(executable).await.is_found() {
            let error = ConfigurationError::not_found(ExecutableRole::Jit, executable.clone());
            warn!(
                target: RUN_TARGET,
                executable = %executable,
                "run executable not found; nothing spawned"
            );
            self.notifier.error_with_action(
                &error.to_string(),
                NotificationAction::OpenSettings(error.setting()),
            );
            return Err(error);
        }

        let command_line = invocation.command_line();
        self.write_header(invocation, &command_line);
        let outcome = self.execute(invocation, &command_line).await;
        self.report(&outcome);
        Ok(outcome)
    }

    fn write_header(&self, invocation: &RunInvocation, command_line: &CommandLine) {
        if self.clear_before_run {
            self.sink.clear();
        }
        self.sink.show(false);
        self.sink
            .append_line(&format!("Running: {}", invocation.file_name()));
        self.sink
            .append_line(&format!("Command: {}", command_line.display()));
        self.sink.append_line(SEPARATOR);
    }

    async fn execute(&self, invocation: &RunInvocation, command_line: &CommandLine) -> RunOutcome {
        let strategy = SpawnStrategy::for_executable(self.platform, command_line.program());
        let mut command = match command_line.to_command(strategy, invocation.working_directory()) {
            Ok(command) => command,
            Err(error) => {
                return RunOutcome::LaunchFailed {
                    reason: error.to_string(),
                };
            }
        };

        info!(
            target: RUN_TARGET,
            command = %command_line.display(),
            cwd = %invocation.working_directory().display(),
            strategy = ?strategy,
            "starting run"
        );

        match command.output().await {
            Ok(output) => {
                let outcome = RunOutcome::from_output(&output);
                info!(
                    target: RUN_TARGET,
                    exit_code = output.status.code().unwrap_or(UNKNOWN_EXIT_CODE),
                    success = outcome.is_success(),
                    "run finished"
                );
                outcome
            }
            Err(error) => {
                warn!(target: RUN_TARGET, error = %error, "run failed to start");
                RunOutcome::LaunchFailed {
                    reason: error.to_string(),
                }
            }
        }
    }

    fn report(&self, outcome: &RunOutcome) {
        if let Some(output) = outcome.output() {
            if !output.stdout.is_empty() {
                self.sink.append_line(&output.stdout);
            }
            if !output.stderr.is_empty() {
                self.sink.append_line(ERROR_OUTPUT_MARKER);
                self.sink.append_line(&output.stderr);
            }
        }
        self.sink.append_line(SEPARATOR);
        self.sink.append_line(&outcome.terminal_line());

        if let Some(message) = outcome.failure_message() {
            debug!(target: RUN_TARGET, message = %message, "raising failure notification");
            self.notifier.error(&message);
        }
    }
}

fn trim_line_end(text: &str) -> &str {
    text.strip_suffix("\r\n")
        .or_else(|| text.strip_suffix('\n'))
        .unwrap_or(text)
}

#[cfg(test)]
mod tests;
