//! Executable resolution performed before any process is spawned.
//!
//! A configured executable is either a bare command name, looked up through
//! the host's command-lookup program, or a filesystem path, checked for
//! existence directly. Resolution is never cached: every run and every
//! session start probes again so configuration edits take effect at once.

use std::fmt;
use std::path::{Path, is_separator};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, warn};

/// Log target for resolver operations.
const RESOLVER_TARGET: &str = "phasor_supervisor::resolver";

/// Exit status used by `which` and `where` when the command is absent.
const LOOKUP_ABSENT_STATUS: i32 = 1;

/// An executable as configured by the user: a bare name or a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExecutableSpec(String);

impl ExecutableSpec {
    /// Wraps a configured executable string.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the configured text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the configured text as a path.
    #[must_use]
    pub fn as_path(&self) -> &Path {
        Path::new(self.0.as_str())
    }

    /// Whether the spec names a filesystem path rather than a bare command.
    ///
    /// `/` always counts as a separator; `\` counts on hosts where it is one.
    #[must_use]
    pub fn is_path(&self) -> bool {
        self.0.chars().any(|c| c == '/' || is_separator(c))
    }

    /// Anchors a relative path-shaped spec to the current directory.
    ///
    /// Children are spawned in another directory, so a relative path must be
    /// fixed before resolution for the probed file to be the spawned one.
    /// Bare names and absolute paths come back unchanged, as does the spec
    /// when the current directory cannot be read.
    #[must_use]
    pub fn anchored(self) -> Self {
        if !self.is_path() || self.as_path().is_absolute() {
            return self;
        }
        let absolute = std::path::absolute(self.as_path());
        match absolute {
            Ok(path) => Self(path.to_string_lossy().into_owned()),
            Err(error) => {
                warn!(
                    target: RESOLVER_TARGET,
                    executable = %self,
                    error = %error,
                    "cannot anchor relative executable path"
                );
                self
            }
        }
    }
}

impl fmt::Display for ExecutableSpec {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl From<&str> for ExecutableSpec {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Outcome of resolving an executable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The executable exists.
    Found,
    /// The executable is absent or could not be looked up.
    NotFound,
}

impl Resolution {
    /// Whether the executable was found.
    #[must_use]
    pub const fn is_found(self) -> bool {
        matches!(self, Self::Found)
    }
}

/// Detailed result of a single probe.
///
/// [`Resolver::resolve`] folds this into a [`Resolution`]; the extra detail
/// only feeds diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    /// The executable exists.
    Found,
    /// The lookup ran and reported the executable as absent.
    Absent,
    /// The lookup itself could not be carried out.
    LookupFailed {
        /// Why the lookup failed.
        reason: String,
    },
}

impl Probe {
    /// Collapses the probe into the two-valued resolution.
    #[must_use]
    pub const fn resolution(&self) -> Resolution {
        match self {
            Self::Found => Resolution::Found,
            Self::Absent | Self::LookupFailed { .. } => Resolution::NotFound,
        }
    }
}

/// Host operating system family, which decides the lookup program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPlatform {
    /// Windows-family hosts, using `where`.
    Windows,
    /// POSIX-family hosts, using `which`.
    Posix,
}

impl HostPlatform {
    /// Platform of the running host.
    #[must_use]
    pub const fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Posix
        }
    }

    /// Name of the standard command-lookup program on this platform.
    #[must_use]
    pub const fn lookup_program(self) -> &'static str {
        match self {
            Self::Windows => "where",
            Self::Posix => "which",
        }
    }
}

/// Looks bare command names up on the host.
///
/// The production implementation is [`SystemLookup`]; tests substitute
/// scripted lookups so no real program runs.
pub trait CommandLookup: Send + Sync {
    /// Reports whether `command` can be found using the platform's lookup.
    fn lookup(&self, platform: HostPlatform, command: &str) -> impl Future<Output = Probe> + Send;
}

/// Runs `which` or `where` with the command as its only argument.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLookup;

impl CommandLookup for SystemLookup {
    async fn lookup(&self, platform: HostPlatform, command: &str) -> Probe {
        let program = platform.lookup_program();
        let status = Command::new(program)
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await;

        match status {
            Ok(status) if status.success() => Probe::Found,
            Ok(status) if status.code() == Some(LOOKUP_ABSENT_STATUS) => Probe::Absent,
            Ok(status) => Probe::LookupFailed {
                reason: format!("{program} exited with {status}"),
            },
            Err(error) => Probe::LookupFailed {
                reason: format!("failed to run {program}: {error}"),
            },
        }
    }
}

/// Decides whether configured executables exist.
#[derive(Debug, Default, Clone)]
pub struct Resolver<L = SystemLookup> {
    lookup: L,
    platform: Option<HostPlatform>,
}

impl Resolver<SystemLookup> {
    /// Builds a resolver backed by the host's lookup program.
    #[must_use]
    pub const fn system() -> Self {
        Self {
            lookup: SystemLookup,
            platform: None,
        }
    }
}

impl<L: CommandLookup> Resolver<L> {
    /// Builds a resolver over a custom lookup.
    #[must_use]
    pub const fn new(lookup: L) -> Self {
        Self {
            lookup,
            platform: None,
        }
    }

    /// Pins the platform instead of detecting it on every call.
    #[must_use]
    pub const fn with_platform(mut self, platform: HostPlatform) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Returns the underlying lookup.
    #[must_use]
    pub const fn lookup(&self) -> &L {
        &self.lookup
    }

    /// Resolves `spec` to [`Resolution::Found`] or [`Resolution::NotFound`].
    ///
    /// Lookup failures are folded into `NotFound`; they are logged so the
    /// cause stays visible to operators.
    pub async fn resolve(&self, spec: &ExecutableSpec) -> Resolution {
        self.probe(spec).await.resolution()
    }

    /// Probes `spec` and keeps the reason for a negative answer.
    ///
    /// Path-shaped specs are checked on the filesystem only; the command
    /// lookup is never consulted for them.
    pub async fn probe(&self, spec: &ExecutableSpec) -> Probe {
        let probe = if spec.is_path() {
            probe_path(spec.as_path()).await
        } else {
            let platform = self.platform.unwrap_or_else(HostPlatform::current);
            self.lookup.lookup(platform, spec.as_str()).await
        };

        match &probe {
            Probe::Found => debug!(
                target: RESOLVER_TARGET,
                executable = %spec,
                path_form = spec.is_path(),
                "executable resolved"
            ),
            Probe::Absent => debug!(
                target: RESOLVER_TARGET,
                executable = %spec,
                path_form = spec.is_path(),
                "executable not found"
            ),
            Probe::LookupFailed { reason } => warn!(
                target: RESOLVER_TARGET,
                executable = %spec,
                reason = %reason,
                "executable lookup failed; treating as not found"
            ),
        }

        probe
    }
}

async fn probe_path(path: &Path) -> Probe {
    match tokio::fs::try_exists(path).await {
        Ok(true) => Probe::Found,
        Ok(false) => Probe::Absent,
        Err(error) => Probe::LookupFailed {
            reason: format!("cannot access {}: {error}", path.display()),
        },
    }
}
