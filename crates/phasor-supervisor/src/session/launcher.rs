//! Spawning the language server process.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use tokio::process::{Child, Command};
use tracing::debug;

use super::SESSION_TARGET;
use super::error::SessionError;
use super::transport::Transport;

/// What to start: program, arguments, and working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    /// Program to execute.
    pub program: String,
    /// Arguments in order.
    pub args: Vec<String>,
    /// Working directory of the server.
    pub working_dir: PathBuf,
}

/// A started server: its transport and, when it is a real process, its handle.
pub struct LaunchedServer {
    /// Duplex stream to the server.
    pub transport: Transport,
    /// Child process, absent for in-process servers.
    pub child: Option<Child>,
}

/// Starts language servers for a session.
///
/// [`ProcessLauncher`] spawns real processes; tests connect sessions to
/// in-memory servers instead.
pub trait SessionLauncher: Send + Sync {
    /// Starts the server described by `command`.
    fn launch(
        &self,
        command: &LaunchCommand,
    ) -> impl Future<Output = Result<LaunchedServer, SessionError>> + Send;
}

/// Spawns the server with piped stdin and stdout.
///
/// The server's stderr is discarded and the process is killed if its handle
/// is dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessLauncher;

impl SessionLauncher for ProcessLauncher {
    async fn launch(&self, command: &LaunchCommand) -> Result<LaunchedServer, SessionError> {
        debug!(
            target: SESSION_TARGET,
            command = %command.program,
            args = ?command.args,
            cwd = %command.working_dir.display(),
            "spawning language server process"
        );

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .current_dir(&command.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|error| spawn_failed(command, error))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| spawn_failed(command, std::io::Error::other("no stdin")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_failed(command, std::io::Error::other("no stdout")))?;

        debug!(
            target: SESSION_TARGET,
            pid = child.id(),
            "language server process spawned"
        );

        Ok(LaunchedServer {
            transport: Transport::new(stdout, stdin),
            child: Some(child),
        })
    }
}

fn spawn_failed(command: &LaunchCommand, error: std::io::Error) -> SessionError {
    SessionError::SpawnFailed {
        command: command.program.clone(),
        source: Arc::new(error),
    }
}
