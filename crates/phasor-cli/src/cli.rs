//! Command-line interface definitions for `phasor-shim`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Editor shim for the Phasor JIT and language server.
#[derive(Parser, Debug)]
#[command(name = "phasor-shim", version, disable_help_subcommand = true)]
pub(crate) struct Cli {
    /// The operation to perform.
    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

/// Operations exposed by the shim.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub(crate) enum CliCommand {
    /// Runs Phasor source files with the configured JIT.
    Run {
        /// Source files to run; several files run concurrently.
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
    },
    /// Starts the language server and keeps it running until interrupted.
    Lsp {
        /// Workspace root; defaults to the current directory.
        #[arg(long, value_name = "DIR")]
        root: Option<PathBuf>,
    },
    /// Reports whether the configured executables can be found.
    Check,
}
