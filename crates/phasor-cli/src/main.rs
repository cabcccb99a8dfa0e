//! Entry point for the `phasor-shim` host.
//!
//! The binary delegates to [`phasor_cli::run`], which loads configuration,
//! installs telemetry and drives the run, language server and check
//! commands against the console.

use std::io;
use std::process::ExitCode;

use phasor_cli::Console;

fn main() -> ExitCode {
    let mut stderr = io::stderr();
    phasor_cli::run(std::env::args_os(), &Console::stdio(), &mut stderr)
}
