//! Persistent language server session.
//!
//! A [`ServerSession`] owns one long-lived `phasor-lsp` child process and the
//! framed JSON-RPC transport over its stdio. It is started once, serves the
//! host for its whole lifetime, and is stopped once with an orderly
//! `shutdown`/`exit` handshake. A failed session is not restarted.
//!
//! # Architecture
//!
//! - [`SessionConfig`]: executable, arguments, root, trace level, timeouts
//! - [`SessionState`]: the lifecycle state machine
//! - [`SessionLauncher`] and [`ProcessLauncher`]: process spawning seam
//! - [`Transport`]: `Content-Length` framed duplex stream
//! - [`ServerEvent`]: notifications surfaced to the host

mod config;
mod error;
mod events;
mod jsonrpc;
mod launcher;
mod lifecycle;
mod messaging;
mod state;
mod transport;

use std::collections::VecDeque;
use std::sync::Arc;

use lsp_types::{
    ClientCapabilities, ClientInfo, DidChangeWatchedFilesClientCapabilities,
    DidChangeWatchedFilesParams, FileEvent, InitializeParams, InitializeResult, InitializedParams,
    ServerInfo, SetTraceParams, WorkspaceClientCapabilities, WorkspaceFolder,
};
use phasor_config::TraceLevel;
use serde::Serialize;
use serde_json::Value;
use tokio::process::Child;
use tokio::time::timeout;
use tracing::{debug, info, warn};

pub use self::config::{
    DEFAULT_GRACE_PERIOD, DEFAULT_SHUTDOWN_TIMEOUT, DEFAULT_STARTUP_TIMEOUT, SessionConfig,
    trace_value,
};
pub use self::error::{SessionError, TransportError};
pub use self::events::ServerEvent;
pub use self::jsonrpc::{
    JsonRpcError, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    METHOD_NOT_FOUND, RequestIds, ServerNotification, ServerRequest,
};
pub use self::launcher::{LaunchCommand, LaunchedServer, ProcessLauncher, SessionLauncher};
pub use self::state::SessionState;
pub use self::transport::{BoxedReader, BoxedWriter, FrameReader, FrameWriter, Transport};
use self::lifecycle::{abandon_child, terminate_child};
use self::messaging::Connection;
use crate::errors::{ConfigurationError, ExecutableRole};
use crate::resolver::{CommandLookup, Resolver, SystemLookup};
use crate::sink::{NotificationAction, Notifier, StatusSink};
use crate::uri::directory_uri;

/// Log target for session operations.
pub(crate) const SESSION_TARGET: &str = "phasor_supervisor::session";

/// Sink line written once the handshake completes.
pub const SERVER_STARTED: &str = "Language server started";

/// Sink line written after an orderly shutdown.
pub const SERVER_STOPPED: &str = "Language server stopped";

/// Client name announced during initialisation.
pub const CLIENT_NAME: &str = "phasor-shim";

/// The host's single connection to the Phasor language server.
pub struct ServerSession<L = SystemLookup, S = ProcessLauncher> {
    config: SessionConfig,
    resolver: Resolver<L>,
    launcher: S,
    sink: Arc<dyn StatusSink>,
    notifier: Arc<dyn Notifier>,
    state: SessionState,
    transitions: Vec<SessionState>,
    connection: Option<Connection>,
    child: Option<Child>,
    pending: VecDeque<ServerEvent>,
    server_info: Option<ServerInfo>,
}

impl ServerSession {
    /// Builds a session that resolves on the host and spawns real processes.
    #[must_use]
    pub fn new(
        config: SessionConfig,
        sink: Arc<dyn StatusSink>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self::with_parts(config, Resolver::system(), ProcessLauncher, sink, notifier)
    }
}

impl<L: CommandLookup, S: SessionLauncher> ServerSession<L, S> {
    /// Builds a session from explicit collaborators.
    #[must_use]
    pub fn with_parts(
        config: SessionConfig,
        resolver: Resolver<L>,
        launcher: S,
        sink: Arc<dyn StatusSink>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            resolver,
            launcher,
            sink,
            notifier,
            state: SessionState::NotStarted,
            transitions: vec![SessionState::NotStarted],
            connection: None,
            child: None,
            pending: VecDeque::new(),
            server_info: None,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Every state entered so far, starting with `NotStarted`.
    #[must_use]
    pub fn transitions(&self) -> &[SessionState] {
        self.transitions.as_slice()
    }

    /// Session configuration.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Identity reported by the server during initialisation.
    #[must_use]
    pub const fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    /// Starts the server and performs the initialisation handshake.
    ///
    /// The executable is resolved first; when it is missing the session
    /// fails, the user is offered the settings, and nothing is spawned.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidState`] unless the session is
    /// `NotStarted`, [`SessionError::Configuration`] when the executable does
    /// not resolve, and the spawn, transport, or timeout error that made the
    /// handshake fail. Every failure leaves the session `Failed`.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::NotStarted {
            return Err(SessionError::InvalidState {
                operation: "start",
                state: self.state,
            });
        }
        self.enter(SessionState::Starting)?;

        let executable = self.config.executable.clone();
        if !self.resolver.resolve(&executable).await.is_found() {
            let error = ConfigurationError::not_found(ExecutableRole::LanguageServer, executable);
            warn!(
                target: SESSION_TARGET,
                executable = %self.config.executable,
                "language server executable not found; nothing spawned"
            );
            self.enter(SessionState::Failed)?;
            self.notifier.error_with_action(
                &error.to_string(),
                NotificationAction::OpenSettings(error.setting()),
            );
            return Err(error.into());
        }

        let startup_timeout = self.config.startup_timeout;
        let handshake = match timeout(startup_timeout, self.launch_and_initialise()).await {
            Ok(result) => result,
            Err(_) => Err(SessionError::Timeout {
                operation: "language server start-up",
                timeout_ms: startup_timeout.as_millis(),
            }),
        };
        if let Err(error) = handshake {
            self.release_after_failure();
            self.enter(SessionState::Failed)?;
            self.notifier
                .error(&format!("Phasor language server failed to start: {error}"));
            return Err(error);
        }

        self.enter(SessionState::Running)?;
        info!(
            target: SESSION_TARGET,
            server = self.server_info.as_ref().map_or("unknown", |info| info.name.as_str()),
            version = self.server_info.as_ref().and_then(|info| info.version.as_deref()),
            "language server started"
        );
        self.sink.append_line(SERVER_STARTED);
        Ok(())
    }

    /// Forwards a new trace level to the running server.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidState`] unless the session is running,
    /// or the transport error that prevented sending.
    pub async fn set_trace(&mut self, level: TraceLevel) -> Result<(), SessionError> {
        self.require_running("set trace")?;
        let params = SetTraceParams {
            value: trace_value(level),
        };
        self.notify("$/setTrace", &params).await?;
        self.config.trace = level;
        Ok(())
    }

    /// Informs the server about changed source files.
    ///
    /// Empty batches are not sent.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidState`] unless the session is running,
    /// or the transport error that prevented sending.
    pub async fn did_change_watched_files(
        &mut self,
        changes: Vec<FileEvent>,
    ) -> Result<(), SessionError> {
        self.require_running("forward file changes")?;
        if changes.is_empty() {
            return Ok(());
        }
        let params = DidChangeWatchedFilesParams { changes };
        self.notify("workspace/didChangeWatchedFiles", &params).await
    }

    /// Waits for the next notification from the server.
    ///
    /// Events queued during request handling are returned first. Log and
    /// show-message text is appended to the status sink. Returns `Ok(None)`
    /// once the session is no longer running and nothing is queued.
    ///
    /// # Errors
    ///
    /// A transport or codec failure fails the session, notifies the user,
    /// and is returned.
    pub async fn next_event(&mut self) -> Result<Option<ServerEvent>, SessionError> {
        if let Some(event) = self.pending.pop_front() {
            self.surface(&event);
            return Ok(Some(event));
        }
        if self.state != SessionState::Running {
            return Ok(None);
        }

        loop {
            let received = match self.connection.as_mut() {
                Some(connection) => read_notification(connection).await,
                None => Err(SessionError::NotConnected),
            };
            match received {
                Ok(Some(event)) => {
                    self.surface(&event);
                    return Ok(Some(event));
                }
                Ok(None) => {}
                Err(error) => {
                    self.fail_running(&error)?;
                    return Err(error);
                }
            }
        }
    }

    /// Performs the orderly shutdown handshake and releases the server.
    ///
    /// A running session sends `shutdown` (bounded by the shutdown timeout)
    /// and `exit`, then waits for the child to exit before killing it.
    /// Handshake failures are logged and do not prevent reaching `Stopped`.
    /// Stopping a stopped session does nothing; stopping a failed or
    /// half-started one only releases its resources.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidState`] if called while the session is
    /// already stopping.
    pub async fn stop(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Stopped => return Ok(()),
            SessionState::NotStarted => return self.enter(SessionState::Stopped),
            SessionState::Failed => {
                self.release_after_failure();
                return Ok(());
            }
            SessionState::Starting => {
                self.release_after_failure();
                return self.enter(SessionState::Failed);
            }
            SessionState::Stopping => {
                return Err(SessionError::InvalidState {
                    operation: "stop",
                    state: self.state,
                });
            }
            SessionState::Running => {}
        }

        self.enter(SessionState::Stopping)?;
        if let Some(mut connection) = self.connection.take() {
            self.shutdown_handshake(&mut connection).await;
        }
        if let Some(child) = self.child.take() {
            terminate_child(child, self.config.grace_period).await;
        }
        self.pending.clear();
        self.enter(SessionState::Stopped)?;
        info!(target: SESSION_TARGET, "language server stopped");
        self.sink.append_line(SERVER_STOPPED);
        Ok(())
    }

    async fn launch_and_initialise(&mut self) -> Result<(), SessionError> {
        let command = LaunchCommand {
            program: self.config.executable.as_str().to_owned(),
            args: self.config.args.clone(),
            working_dir: self.config.root.clone(),
        };
        let launched = self.launcher.launch(&command).await?;
        self.child = launched.child;
        self.connection = Some(Connection::open(launched.transport));

        let params = self.initialize_params()?;
        let result = self.request("initialize", &params).await?;
        let initialized: InitializeResult = serde_json::from_value(result)?;
        debug!(
            target: SESSION_TARGET,
            capabilities = ?initialized.capabilities,
            "received server capabilities"
        );
        self.server_info = initialized.server_info;
        self.notify("initialized", &InitializedParams {}).await
    }

    #[expect(
        deprecated,
        reason = "root_uri is still read by servers that predate workspace folders"
    )]
    fn initialize_params(&self) -> Result<InitializeParams, SessionError> {
        let root = std::path::absolute(&self.config.root).map_err(|error| {
            SessionError::Handshake {
                message: format!("cannot resolve root {}: {error}", self.config.root.display()),
            }
        })?;
        let root_uri = directory_uri(&root).ok_or_else(|| SessionError::Handshake {
            message: format!("cannot express {} as a URI", root.display()),
        })?;
        let name = root.file_name().map_or_else(
            || root.display().to_string(),
            |name| name.to_string_lossy().into_owned(),
        );

        Ok(InitializeParams {
            process_id: Some(std::process::id()),
            root_uri: Some(root_uri.clone()),
            capabilities: client_capabilities(),
            trace: Some(trace_value(self.config.trace)),
            workspace_folders: Some(vec![WorkspaceFolder {
                uri: root_uri,
                name,
            }]),
            client_info: Some(ClientInfo {
                name: String::from(CLIENT_NAME),
                version: Some(String::from(env!("CARGO_PKG_VERSION"))),
            }),
            ..Default::default()
        })
    }

    async fn shutdown_handshake(&mut self, connection: &mut Connection) {
        let shutdown_timeout = self.config.shutdown_timeout;
        match timeout(
            shutdown_timeout,
            connection.request("shutdown", None, &mut self.pending),
        )
        .await
        {
            Ok(Ok(_)) => debug!(target: SESSION_TARGET, "shutdown acknowledged"),
            Ok(Err(error)) => warn!(
                target: SESSION_TARGET,
                error = %error,
                "shutdown request failed"
            ),
            Err(_) => warn!(
                target: SESSION_TARGET,
                timeout_ms = shutdown_timeout.as_millis(),
                "shutdown request timed out"
            ),
        }
        if let Err(error) = connection.notify("exit", None).await {
            warn!(
                target: SESSION_TARGET,
                error = %error,
                "failed to send exit notification"
            );
        }
    }

    async fn request<P: Serialize>(&mut self, method: &str, params: &P) -> Result<Value, SessionError> {
        let params_value = serde_json::to_value(params)?;
        let connection = self.connection.as_mut().ok_or(SessionError::NotConnected)?;
        connection
            .request(method, Some(params_value), &mut self.pending)
            .await
    }

    async fn notify<P: Serialize>(&mut self, method: &str, params: &P) -> Result<(), SessionError> {
        let params_value = serde_json::to_value(params)?;
        let connection = self.connection.as_mut().ok_or(SessionError::NotConnected)?;
        connection.notify(method, Some(params_value)).await
    }

    fn surface(&self, event: &ServerEvent) {
        if let Some(text) = event.sink_text() {
            self.sink.append_line(text);
        }
    }

    fn require_running(&self, operation: &'static str) -> Result<(), SessionError> {
        if self.state == SessionState::Running {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    fn fail_running(&mut self, error: &SessionError) -> Result<(), SessionError> {
        warn!(
            target: SESSION_TARGET,
            error = %error,
            "language server transport failed"
        );
        self.release_after_failure();
        self.enter(SessionState::Failed)?;
        self.notifier
            .error(&format!("Phasor language server stopped unexpectedly: {error}"));
        Ok(())
    }

    fn release_after_failure(&mut self) {
        self.connection = None;
        if let Some(child) = self.child.take() {
            abandon_child(child);
        }
    }

    fn enter(&mut self, next: SessionState) -> Result<(), SessionError> {
        if !self.state.can_transition_to(next) {
            return Err(SessionError::InvalidState {
                operation: "change state",
                state: self.state,
            });
        }
        debug!(
            target: SESSION_TARGET,
            from = %self.state,
            to = %next,
            "session state changed"
        );
        self.state = next;
        self.transitions.push(next);
        Ok(())
    }
}

/// Reads one message; notifications become events, requests are answered.
async fn read_notification(connection: &mut Connection) -> Result<Option<ServerEvent>, SessionError> {
    match connection.receive().await? {
        JsonRpcMessage::Notification(notification) => Ok(Some(ServerEvent::from_notification(
            notification.method,
            notification.params,
        ))),
        JsonRpcMessage::ServerRequest(request) => {
            connection.answer(request).await?;
            Ok(None)
        }
        JsonRpcMessage::Response(response) => {
            warn!(
                target: SESSION_TARGET,
                id = ?response.id,
                "skipping unsolicited response"
            );
            Ok(None)
        }
    }
}

fn client_capabilities() -> ClientCapabilities {
    ClientCapabilities {
        workspace: Some(WorkspaceClientCapabilities {
            did_change_watched_files: Some(DidChangeWatchedFilesClientCapabilities {
                dynamic_registration: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}
