//! Error types surfaced to the user by runs and sessions.

use std::path::PathBuf;

use phasor_config::SettingLocation;
use thiserror::Error;

use crate::resolver::ExecutableSpec;

/// Which configured executable an error concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutableRole {
    /// The interpreter used for single-file runs.
    Jit,
    /// The language server used by the persistent session.
    LanguageServer,
}

impl ExecutableRole {
    /// Setting the user edits to point at a different executable.
    #[must_use]
    pub const fn setting(self) -> SettingLocation {
        match self {
            Self::Jit => SettingLocation::JIT_PATH,
            Self::LanguageServer => SettingLocation::LSP_PATH,
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Jit => "Phasor JIT",
            Self::LanguageServer => "Phasor language server",
        }
    }
}

/// A configured executable could not be resolved.
///
/// Treated as something for the user to fix, never as a transient failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// Resolution returned `NotFound`.
    #[error(
        "{label} not found at \"{executable}\". Please configure {key} in settings.",
        label = role.label(),
        key = role.setting().key
    )]
    ExecutableNotFound {
        /// Which executable was being resolved.
        role: ExecutableRole,
        /// The configured name or path.
        executable: ExecutableSpec,
    },
}

impl ConfigurationError {
    /// Builds an `ExecutableNotFound` error.
    #[must_use]
    pub const fn not_found(role: ExecutableRole, executable: ExecutableSpec) -> Self {
        Self::ExecutableNotFound { role, executable }
    }

    /// Setting the user should open to correct the problem.
    #[must_use]
    pub const fn setting(&self) -> SettingLocation {
        match self {
            Self::ExecutableNotFound { role, .. } => role.setting(),
        }
    }
}

/// A run request that does not describe a Phasor source file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunRequestError {
    /// The target is not a `.phs` file.
    #[error("Current file is not a Phasor file: {}", path.display())]
    NotPhasorSource {
        /// The rejected path.
        path: PathBuf,
    },

    /// The target path could not be made absolute.
    #[error("cannot resolve {}: {reason}", path.display())]
    UnresolvablePath {
        /// The rejected path.
        path: PathBuf,
        /// Why the current directory was unavailable.
        reason: String,
    },

    /// The target has no parent directory to run in.
    #[error("cannot determine a working directory for {}", path.display())]
    NoParentDirectory {
        /// The rejected path.
        path: PathBuf,
    },
}

/// Failure of a run requested through the host context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    /// The request itself was rejected.
    #[error(transparent)]
    Request(#[from] RunRequestError),

    /// The executable could not be resolved.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}
