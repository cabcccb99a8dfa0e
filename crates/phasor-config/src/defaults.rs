use crate::logging::LogFormat;
use crate::trace::TraceLevel;

/// Default executable used for single-file runs.
pub const DEFAULT_JIT_PATH: &str = "phasor";

/// Default executable used for the language server session.
pub const DEFAULT_LSP_PATH: &str = "phasor-lsp";

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Glob matching the Phasor sources the language server is told about.
pub const SOURCE_GLOB: &str = "**/*.phs";

/// File extension of Phasor source files.
pub const SOURCE_EXTENSION: &str = "phs";

/// Owned default for the run executable.
#[must_use]
pub fn default_jit_path() -> String {
    DEFAULT_JIT_PATH.to_owned()
}

/// Owned default for the language server executable.
#[must_use]
pub fn default_lsp_path() -> String {
    DEFAULT_LSP_PATH.to_owned()
}

/// Default log filter expression used by the binaries.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Default protocol trace level for the language server.
#[must_use]
pub const fn default_trace_server() -> TraceLevel {
    TraceLevel::Off
}

/// Whether the status output is cleared before each run by default.
#[must_use]
pub const fn default_clear_output_before_run() -> bool {
    true
}
