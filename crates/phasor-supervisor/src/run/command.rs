//! Command composition for single-file runs.
//!
//! Runs spawn the executable with an argument vector wherever the host
//! allows it. Windows batch scripts cannot be executed that way, so they go
//! through `cmd /C` with every token double-quoted; a token that itself
//! contains a double quote cannot be expressed and is rejected.

use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;

use crate::resolver::HostPlatform;

const QUOTE: char = '"';

/// How a composed command line reaches the operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnStrategy {
    /// Spawn the executable directly with an argument vector.
    Direct,
    /// Hand a quoted command string to `cmd /C`.
    WindowsShell,
}

impl SpawnStrategy {
    /// Picks the strategy for `executable` on `platform`.
    #[must_use]
    pub fn for_executable(platform: HostPlatform, executable: &str) -> Self {
        let is_batch = Path::new(executable)
            .extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| ext.eq_ignore_ascii_case("bat") || ext.eq_ignore_ascii_case("cmd"));
        match platform {
            HostPlatform::Windows if is_batch => Self::WindowsShell,
            HostPlatform::Windows | HostPlatform::Posix => Self::Direct,
        }
    }
}

/// A token cannot be quoted for the shell.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("argument {argument:?} contains a double quote and cannot be passed through the shell")]
pub struct UnquotableArgument {
    /// The offending token.
    pub argument: String,
}

/// Executable plus the full, ordered argument vector of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: String,
    arguments: Vec<String>,
}

impl CommandLine {
    /// Composes `arguments ++ [target_file]` for `program`.
    #[must_use]
    pub fn compose(program: &str, arguments: &[String], target_file: &Path) -> Self {
        let mut all = arguments.to_vec();
        all.push(target_file.display().to_string());
        Self {
            program: program.to_owned(),
            arguments: all,
        }
    }

    /// Executable to start.
    #[must_use]
    pub fn program(&self) -> &str {
        self.program.as_str()
    }

    /// Arguments in order, the target file last.
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        self.arguments.as_slice()
    }

    /// Quoted shell form, `"<exe>" "<arg>"... "<file>"`.
    ///
    /// Used for display on every platform and as the `cmd /C` payload for
    /// Windows batch scripts.
    #[must_use]
    pub fn display(&self) -> String {
        std::iter::once(&self.program)
            .chain(&self.arguments)
            .map(|token| format!("{QUOTE}{token}{QUOTE}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Builds the process command for `strategy`, running in `working_dir`.
    ///
    /// Both output streams are captured and stdin is closed.
    ///
    /// # Errors
    ///
    /// Returns [`UnquotableArgument`] when the shell strategy is required and
    /// a token contains a double quote.
    pub fn to_command(
        &self,
        strategy: SpawnStrategy,
        working_dir: &Path,
    ) -> Result<Command, UnquotableArgument> {
        let mut command = match strategy {
            SpawnStrategy::Direct => {
                let mut direct = Command::new(&self.program);
                direct.args(&self.arguments);
                direct
            }
            SpawnStrategy::WindowsShell => {
                self.ensure_quotable()?;
                shell_command(&self.display())
            }
        };
        command
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        Ok(command)
    }

    fn ensure_quotable(&self) -> Result<(), UnquotableArgument> {
        match std::iter::once(&self.program)
            .chain(&self.arguments)
            .find(|token| token.contains(QUOTE))
        {
            Some(token) => Err(UnquotableArgument {
                argument: token.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[cfg(windows)]
fn shell_command(line: &str) -> Command {
    let mut command = Command::new("cmd");
    command.arg("/C").raw_arg(format!("{QUOTE}{line}{QUOTE}"));
    command
}

#[cfg(not(windows))]
fn shell_command(line: &str) -> Command {
    let mut command = Command::new("cmd");
    command.arg("/C").arg(line);
    command
}
