//! Execution of the shim's subcommands on the control task.

use std::path::PathBuf;
use std::process::ExitCode;

use futures::future::join_all;
use lsp_types::FileEvent;
use phasor_supervisor::{
    ExecutableRole, ExecutableSpec, HostContext, Probe, Resolver, ServerSession, SourceWatcher,
};
use tracing::{debug, info, warn};

use crate::cli::CliCommand;
use crate::errors::AppError;

/// Log target for command execution.
const COMMAND_TARGET: &str = "phasor_cli::commands";

/// Executes `command` against `context`.
pub(crate) async fn dispatch(
    command: CliCommand,
    context: &HostContext,
) -> Result<ExitCode, AppError> {
    match command {
        CliCommand::Run { files } => Ok(run_files(context, &files).await),
        CliCommand::Lsp { root } => serve(context, root).await,
        CliCommand::Check => Ok(check(context).await),
    }
}

/// Runs every file concurrently; succeeds only if every run succeeded.
async fn run_files(context: &HostContext, files: &[PathBuf]) -> ExitCode {
    let results = join_all(files.iter().map(|file| context.run_file(file))).await;
    let all_succeeded = results
        .iter()
        .all(|result| result.as_ref().is_ok_and(|outcome| outcome.is_success()));
    debug!(
        target: COMMAND_TARGET,
        files = files.len(),
        all_succeeded,
        "runs finished"
    );
    exit_code(all_succeeded)
}

/// Probes both configured executables and prints the diagnosis.
async fn check(context: &HostContext) -> ExitCode {
    let resolver = Resolver::system();
    let sink = context.sink();
    let config = context.config();
    let mut healthy = true;

    for (role, raw) in [
        (ExecutableRole::Jit, config.jit_path()),
        (ExecutableRole::LanguageServer, config.lsp_path()),
    ] {
        let spec = ExecutableSpec::new(raw);
        let probe = resolver.probe(&spec).await;
        let status = match &probe {
            Probe::Found => String::from("found"),
            Probe::Absent => String::from("not found"),
            Probe::LookupFailed { reason } => format!("not found (lookup failed: {reason})"),
        };
        sink.append_line(&format!("{}: {spec} ({status})", role.setting().key));
        healthy &= probe.resolution().is_found();
    }

    exit_code(healthy)
}

/// Keeps the language server running until interrupted.
///
/// Source changes under `root` are forwarded to the server and server
/// events are pumped to the status sink. Ctrl-C triggers the orderly
/// shutdown.
async fn serve(context: &HostContext, root: Option<PathBuf>) -> Result<ExitCode, AppError> {
    let root = match root {
        Some(root) => root,
        None => std::env::current_dir().map_err(AppError::WorkingDirectory)?,
    };
    let mut session = context.server_session(root.as_path());
    if session.start().await.is_err() {
        // The session has already told the user why.
        return Ok(ExitCode::FAILURE);
    }

    let (watcher, mut changes) = match SourceWatcher::start(&root) {
        Ok(parts) => parts,
        Err(error) => {
            session.stop().await?;
            return Err(error.into());
        }
    };
    info!(
        target: COMMAND_TARGET,
        root = %watcher.root().display(),
        "serving Phasor workspace"
    );

    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    let healthy = loop {
        tokio::select! {
            signal = &mut interrupted => {
                if let Err(error) = signal {
                    warn!(target: COMMAND_TARGET, error = %error, "failed to listen for Ctrl-C");
                }
                info!(target: COMMAND_TARGET, "shutdown requested");
                break true;
            }
            Some(batch) = changes.recv() => forward_changes(&mut session, batch).await,
            event = session.next_event() => match event {
                Ok(Some(event)) => {
                    debug!(target: COMMAND_TARGET, method = event.method(), "server event");
                }
                Ok(None) | Err(_) => break false,
            },
        }
    };

    drop(watcher);
    session.stop().await?;
    Ok(exit_code(healthy))
}

async fn forward_changes(session: &mut ServerSession, batch: Vec<FileEvent>) {
    let count = batch.len();
    match session.did_change_watched_files(batch).await {
        Ok(()) => debug!(target: COMMAND_TARGET, count, "forwarded source changes"),
        Err(error) => warn!(
            target: COMMAND_TARGET,
            error = %error,
            "failed to forward source changes"
        ),
    }
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
