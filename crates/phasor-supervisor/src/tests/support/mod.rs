//! Shared fixtures and doubles for supervisor tests.

mod scripted_server;

use std::path::Path;
use std::sync::{Arc, Mutex};

use mockall::mock;
use phasor_config::Config;

use crate::resolver::{CommandLookup, ExecutableSpec, HostPlatform, Probe, Resolver};
use crate::run::RunInvocation;
use crate::session::{ServerSession, SessionConfig};
use crate::sink::{NotificationAction, Notifier, StatusSink};

pub use scripted_server::{ScriptedLauncher, ServerScript, log_message};

/// Session wired to a scripted server through a scripted lookup.
pub type ScriptedSession = ServerSession<RecordingLookup, ScriptedLauncher>;

mock! {
    pub Notifier {}
    impl Notifier for Notifier {
        fn error(&self, message: &str);
        fn error_with_action(&self, message: &str, action: NotificationAction);
    }
}

/// Notifier that records every notification for later inspection.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    errors: Mutex<Vec<String>>,
    actions: Mutex<Vec<(String, NotificationAction)>>,
}

impl RecordingNotifier {
    /// Plain error messages, oldest first.
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().expect("errors lock").clone()
    }

    /// Messages shown with an action, oldest first.
    pub fn actions(&self) -> Vec<(String, NotificationAction)> {
        self.actions.lock().expect("actions lock").clone()
    }

    /// Whether nothing was shown at all.
    pub fn is_silent(&self) -> bool {
        self.errors().is_empty() && self.actions().is_empty()
    }
}

impl Notifier for RecordingNotifier {
    fn error(&self, message: &str) {
        self.errors
            .lock()
            .expect("errors lock")
            .push(message.to_owned());
    }

    fn error_with_action(&self, message: &str, action: NotificationAction) {
        self.actions
            .lock()
            .expect("actions lock")
            .push((message.to_owned(), action));
    }
}

/// Lookup double answering with a fixed probe and recording its calls.
pub struct RecordingLookup {
    answer: Probe,
    calls: Mutex<Vec<(HostPlatform, String)>>,
}

impl RecordingLookup {
    /// Builds a lookup that always answers `answer`.
    pub const fn answering(answer: Probe) -> Self {
        Self {
            answer,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Lookups performed so far.
    pub fn calls(&self) -> Vec<(HostPlatform, String)> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl CommandLookup for RecordingLookup {
    async fn lookup(&self, platform: HostPlatform, command: &str) -> Probe {
        self.calls
            .lock()
            .expect("calls lock")
            .push((platform, command.to_owned()));
        self.answer.clone()
    }
}

/// Shell used as a stand-in JIT.
pub const SHELL: &str = "/bin/sh";

/// Arguments making the shell run `script`; the target file becomes `$1`.
pub fn shell_args(script: &str) -> Vec<String> {
    vec![
        String::from("-c"),
        script.to_owned(),
        String::from("sh"),
    ]
}

/// Configuration whose JIT is the shell running `script`.
pub fn shell_config(script: &str) -> Config {
    Config {
        jit_path: String::from(SHELL),
        jit_args: shell_args(script),
        ..Config::default()
    }
}

/// A run of `program` executing `script` on `main.phs` inside `dir`.
pub fn script_invocation(program: &str, script: &str, dir: &Path) -> RunInvocation {
    RunInvocation::new(
        ExecutableSpec::new(program),
        shell_args(script),
        dir.join("main.phs"),
        dir.to_path_buf(),
    )
}

/// Session configuration for `phasor-lsp` rooted at `/work`.
pub fn work_session_config() -> SessionConfig {
    SessionConfig::new(ExecutableSpec::new("phasor-lsp"), "/work")
}

/// Connects a session to `launcher`, with `lookup` deciding resolution.
pub fn scripted_session(
    config: SessionConfig,
    lookup: RecordingLookup,
    launcher: &ScriptedLauncher,
    sink: Arc<dyn StatusSink>,
    notifier: Arc<dyn Notifier>,
) -> ScriptedSession {
    ServerSession::with_parts(
        config,
        Resolver::new(lookup),
        launcher.clone(),
        sink,
        notifier,
    )
}
