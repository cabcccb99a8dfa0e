//! Lifecycle states of a server session.

use std::fmt;

/// Lifecycle state of a [`ServerSession`](super::ServerSession).
///
/// `Failed` and `Stopped` are terminal; a session is never restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Created but not yet started.
    NotStarted,
    /// Resolving, spawning, and performing the startup handshake.
    Starting,
    /// Handshake complete; the server is available.
    Running,
    /// Performing the shutdown handshake.
    Stopping,
    /// Shut down in an orderly way.
    Stopped,
    /// Start-up or the transport failed.
    Failed,
}

impl SessionState {
    /// Lower-case label used in messages and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not started",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }

    /// Whether the state machine allows moving from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::NotStarted, Self::Starting | Self::Stopped)
                | (Self::Starting, Self::Running | Self::Failed)
                | (Self::Running, Self::Stopping | Self::Failed)
                | (Self::Stopping, Self::Stopped)
        )
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}
