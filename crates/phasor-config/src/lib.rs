//! Shared configuration for the Phasor editor shim.
//!
//! Settings are layered by `ortho_config`: built-in defaults, then an
//! optional configuration file (`--config-path` or `PHASOR_CONFIG_PATH`),
//! then `PHASOR_*` environment variables, then command-line flags. The
//! resulting [`Config`] is read-only for the lifetime of an operation and is
//! re-read by callers whenever they need fresh values.

mod defaults;
mod logging;
mod trace;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_JIT_PATH, DEFAULT_LOG_FILTER, DEFAULT_LSP_PATH, SOURCE_EXTENSION, SOURCE_GLOB,
    default_clear_output_before_run, default_jit_path, default_log_filter,
    default_log_filter_string, default_log_format, default_lsp_path, default_trace_server,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use trace::{TraceLevel, TraceLevelParseError};

/// Configuration keys recognised on the command line.
///
/// The CLI uses this list to separate configuration flags from subcommand
/// tokens before handing them to the loader. Boolean switches take no value.
pub const CONFIG_CLI_FLAGS: &[(&str, bool)] = &[
    ("--config-path", true),
    ("--jit-path", true),
    ("--jit-args", true),
    ("--clear-output-before-run", false),
    ("--lsp-path", true),
    ("--lsp-args", true),
    ("--trace-server", true),
    ("--log-filter", true),
    ("--log-format", true),
];

/// Runtime configuration for run and language server operations.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "PHASOR")]
pub struct Config {
    /// Executable name or path used for single-file runs.
    #[ortho_config(default = default_jit_path())]
    pub jit_path: String,
    /// Extra arguments placed before the target file.
    #[serde(default)]
    pub jit_args: Vec<String>,
    /// Whether the status output is cleared before each run.
    #[ortho_config(default = default_clear_output_before_run())]
    pub clear_output_before_run: bool,
    /// Executable name or path of the language server.
    #[ortho_config(default = default_lsp_path())]
    pub lsp_path: String,
    /// Extra arguments passed to the language server.
    #[serde(default)]
    pub lsp_args: Vec<String>,
    /// Protocol trace level forwarded to the language server.
    #[ortho_config(default = default_trace_server())]
    pub trace_server: TraceLevel,
    /// Filter expression for host telemetry.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Output format for host telemetry.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            jit_path: default_jit_path(),
            jit_args: Vec::new(),
            clear_output_before_run: default_clear_output_before_run(),
            lsp_path: default_lsp_path(),
            lsp_args: Vec::new(),
            trace_server: default_trace_server(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Executable name or path used for single-file runs.
    #[must_use]
    pub fn jit_path(&self) -> &str {
        self.jit_path.as_str()
    }

    /// Extra run arguments, in order.
    #[must_use]
    pub fn jit_args(&self) -> &[String] {
        self.jit_args.as_slice()
    }

    /// Whether runs clear the status output first.
    #[must_use]
    pub const fn clear_output_before_run(&self) -> bool {
        self.clear_output_before_run
    }

    /// Executable name or path of the language server.
    #[must_use]
    pub fn lsp_path(&self) -> &str {
        self.lsp_path.as_str()
    }

    /// Extra language server arguments, in order.
    #[must_use]
    pub fn lsp_args(&self) -> &[String] {
        self.lsp_args.as_slice()
    }

    /// Trace level forwarded to the language server.
    #[must_use]
    pub const fn trace_server(&self) -> TraceLevel {
        self.trace_server
    }

    /// Filter expression for host telemetry.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Output format for host telemetry.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}

/// Maps a configuration field to the settings key and environment variable
/// a user edits to change it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingLocation {
    /// Key used in the configuration file.
    pub key: &'static str,
    /// Environment variable overriding the key.
    pub env: &'static str,
    /// Command-line flag overriding the key.
    pub flag: &'static str,
}

impl SettingLocation {
    /// Location of the run executable setting.
    pub const JIT_PATH: Self = Self {
        key: "jit_path",
        env: "PHASOR_JIT_PATH",
        flag: "--jit-path",
    };

    /// Location of the language server executable setting.
    pub const LSP_PATH: Self = Self {
        key: "lsp_path",
        env: "PHASOR_LSP_PATH",
        flag: "--lsp-path",
    };
}
