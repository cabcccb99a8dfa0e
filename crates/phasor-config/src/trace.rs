//! Trace verbosity forwarded to the language server.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Protocol trace level requested from the Phasor language server.
///
/// The wire names match the LSP `TraceValue` strings so the value can be
/// forwarded verbatim in `initialize` and `$/setTrace`.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, Hash, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum TraceLevel {
    /// No protocol tracing.
    #[default]
    Off,
    /// Trace message names only.
    Messages,
    /// Trace messages with their payloads.
    Verbose,
}

impl TraceLevel {
    /// Returns the wire identifier for this level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Messages => "messages",
            Self::Verbose => "verbose",
        }
    }
}

/// Errors encountered while parsing a [`TraceLevel`] from text.
pub type TraceLevelParseError = strum::ParseError;
