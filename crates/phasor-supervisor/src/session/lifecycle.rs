//! Child process termination for the language server.

use std::time::Duration;

use tokio::process::Child;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::SESSION_TARGET;

/// Waits up to `grace` for the server to exit, then kills it.
///
/// Errors are logged rather than returned: termination runs during teardown
/// and must always leave the child reaped or killed.
pub(super) async fn terminate_child(mut child: Child, grace: Duration) {
    let pid = child.id();
    match timeout(grace, child.wait()).await {
        Ok(Ok(status)) => {
            debug!(
                target: SESSION_TARGET,
                pid,
                ?status,
                "language server exited"
            );
        }
        Ok(Err(error)) => {
            warn!(
                target: SESSION_TARGET,
                pid,
                error = %error,
                "failed to wait for language server, killing"
            );
            kill(&mut child, pid).await;
        }
        Err(_) => {
            warn!(
                target: SESSION_TARGET,
                pid,
                grace_ms = grace.as_millis(),
                "language server did not exit within the grace period, killing"
            );
            kill(&mut child, pid).await;
        }
    }
}

/// Starts killing the server without waiting, for use on failure paths.
pub(super) fn abandon_child(mut child: Child) {
    let pid = child.id();
    if let Err(error) = child.start_kill() {
        debug!(
            target: SESSION_TARGET,
            pid,
            error = %error,
            "language server already gone"
        );
    }
}

async fn kill(child: &mut Child, pid: Option<u32>) {
    if let Err(error) = child.kill().await {
        warn!(
            target: SESSION_TARGET,
            pid,
            error = %error,
            "failed to kill language server"
        );
    }
}
