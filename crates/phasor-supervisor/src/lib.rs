//! External-process supervision for the Phasor editor shim.
//!
//! The crate locates configured executables, runs the Phasor JIT on single
//! files, and keeps a persistent session with the Phasor language server.
//! Everything user-visible goes through the [`StatusSink`] and [`Notifier`]
//! collaborators, which the host owns and passes in through a
//! [`HostContext`]; nothing here holds process-wide state.
//!
//! - [`Resolver`]: decides whether an executable exists before anything is
//!   spawned
//! - [`RunSupervisor`]: one run of the JIT per request, exactly one terminal
//!   outcome each
//! - [`ServerSession`]: `NotStarted → Starting → Running → Stopping →
//!   Stopped`, with `Failed` as the absorbing failure state
//! - [`SourceWatcher`]: `**/*.phs` changes forwarded to the session

mod context;
mod errors;
mod resolver;
pub mod run;
pub mod session;
mod sink;
mod uri;
mod watch;

pub use context::HostContext;
pub use errors::{ConfigurationError, ExecutableRole, RunError, RunRequestError};
pub use resolver::{
    CommandLookup, ExecutableSpec, HostPlatform, Probe, Resolution, Resolver, SystemLookup,
};
pub use run::{CapturedOutput, RunInvocation, RunOutcome, RunSupervisor};
pub use session::{ServerEvent, ServerSession, SessionConfig, SessionError, SessionState};
pub use sink::{MemorySink, NotificationAction, Notifier, SinkEntry, StatusSink, WriterSink};
pub use uri::{directory_uri, file_uri};
pub use watch::{SourceWatcher, WatchError, classify, source_matcher};

#[cfg(test)]
mod tests;
