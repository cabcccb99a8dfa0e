//! Configuration loading helpers for the shim.
//!
//! Configuration flags are separated from subcommand tokens so the loader
//! only receives flags it understands while `clap` sees the command.

use std::ffi::{OsStr, OsString};

use ortho_config::OrthoConfig;
use phasor_config::{CONFIG_CLI_FLAGS, Config};

use crate::errors::AppError;

/// Source of the layered configuration.
pub(crate) trait ConfigLoader {
    /// Loads configuration from `args`, the program name followed by flags.
    ///
    /// # Flag Ordering
    ///
    /// Configuration flags must appear before the subcommand. Flags after it
    /// are parsed as subcommand arguments.
    fn load(&self, args: &[OsString]) -> Result<Config, AppError>;
}

/// Loads defaults, the configuration file, `PHASOR_*` variables and flags.
pub(crate) struct OrthoConfigLoader;

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, AppError> {
        Config::load_from_iter(args.iter().cloned()).map_err(AppError::LoadConfiguration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagAction {
    Include { needs_value: bool },
    Stop,
}

fn classify_flag(argument: &OsStr) -> FlagAction {
    let text = argument.to_string_lossy();
    if !text.starts_with("--") {
        return FlagAction::Stop;
    }
    let (flag, inline_value) = text
        .split_once('=')
        .map_or((&*text, false), |(flag, _)| (flag, true));

    CONFIG_CLI_FLAGS
        .iter()
        .find(|(known, _)| *known == flag)
        .map_or(FlagAction::Stop, |(_, takes_value)| FlagAction::Include {
            needs_value: *takes_value && !inline_value,
        })
}

/// Arguments destined for the loader and where the command begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ConfigArgumentSplit {
    pub(crate) config_arguments: Vec<OsString>,
    pub(crate) command_arguments: Vec<OsString>,
}

/// Splits leading configuration flags from the command.
///
/// Both halves keep the program name in first position.
pub(crate) fn split_config_arguments(args: &[OsString]) -> ConfigArgumentSplit {
    let Some((program, rest)) = args.split_first() else {
        return ConfigArgumentSplit {
            config_arguments: Vec::new(),
            command_arguments: Vec::new(),
        };
    };

    let mut config_arguments = vec![program.clone()];
    let mut remaining = rest.iter().peekable();
    while let Some(argument) = remaining.peek() {
        match classify_flag(argument) {
            FlagAction::Include { needs_value } => {
                config_arguments.extend(remaining.next().cloned());
                if needs_value {
                    config_arguments.extend(remaining.next().cloned());
                }
            }
            FlagAction::Stop => break,
        }
    }

    let command_arguments = std::iter::once(program.clone())
        .chain(remaining.cloned())
        .collect();
    ConfigArgumentSplit {
        config_arguments,
        command_arguments,
    }
}
