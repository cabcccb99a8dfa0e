//! Command-line runtime for the Phasor editor shim.
//!
//! The runtime splits configuration flags from the subcommand, loads the
//! layered configuration, installs telemetry and then drives the requested
//! command on a current-thread Tokio runtime. Status output and notifications
//! flow through a [`Console`] so tests can substitute in-memory doubles.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use phasor_supervisor::HostContext;
use tracing::debug;

mod cli;
mod commands;
mod config;
mod console;
mod errors;
pub mod telemetry;

use cli::Cli;
use config::{ConfigArgumentSplit, ConfigLoader, OrthoConfigLoader, split_config_arguments};
pub use console::{Console, ConsoleNotifier, ConsoleSink};
pub use errors::AppError;

/// Runs the shim with `args`, the program name followed by its arguments.
///
/// Command output goes to the console; failures that the notifier has not
/// already reported are written to `stderr`.
pub fn run<I, E>(args: I, console: &Console, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    E: Write,
{
    run_with_loader(args, &OrthoConfigLoader, console, stderr)
}

fn run_with_loader<I, E, L>(args: I, loader: &L, console: &Console, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    E: Write,
    L: ConfigLoader,
{
    let args: Vec<OsString> = args.into_iter().collect();
    let split = split_config_arguments(&args);

    let cli = match Cli::try_parse_from(split.command_arguments.iter().cloned()) {
        Ok(cli) => cli,
        // Help and version requests are successful output.
        Err(error) if !error.use_stderr() => {
            console.sink().append_line(error.to_string().trim_end());
            return ExitCode::SUCCESS;
        }
        Err(error) => return report(stderr, &AppError::CliUsage(error)),
    };

    execute(cli, &split, loader, console).unwrap_or_else(|error| report(stderr, &error))
}

fn execute<L: ConfigLoader>(
    cli: Cli,
    split: &ConfigArgumentSplit,
    loader: &L,
    console: &Console,
) -> Result<ExitCode, AppError> {
    let config = loader.load(&split.config_arguments)?;
    telemetry::initialise(&config)?;
    debug!(target: "phasor_cli", command = ?cli.command, "dispatching command");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(AppError::Runtime)?;
    let context = HostContext::new(config, console.sink(), console.notifier());
    runtime.block_on(commands::dispatch(cli.command, &context))
}

fn report<E: Write>(stderr: &mut E, error: &AppError) -> ExitCode {
    let written = match error {
        AppError::CliUsage(usage) => write!(stderr, "{usage}"),
        other => writeln!(stderr, "phasor-shim: {other}"),
    };
    if let Err(write_error) = written {
        debug!(target: "phasor_cli", error = %write_error, "failed to write to stderr");
    }
    ExitCode::FAILURE
}
