//! In-memory language server driven by a script.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{DuplexStream, ReadHalf, WriteHalf};
use tokio::task::JoinHandle;

use crate::session::{
    FrameReader, FrameWriter, LaunchCommand, LaunchedServer, SessionError, SessionLauncher,
    Transport,
};

/// How the scripted server behaves.
#[derive(Debug, Clone, Default)]
pub struct ServerScript {
    /// Messages sent before answering `initialize`.
    pub before_initialize_reply: Vec<Value>,
    /// Error object returned instead of an `initialize` result.
    pub initialize_error: Option<Value>,
    /// Never answer `initialize`.
    pub silent_initialize: bool,
    /// Messages sent after `initialized` arrives.
    pub after_initialized: Vec<Value>,
    /// Close the connection once `initialized` arrives.
    pub close_after_initialized: bool,
    /// Never answer `shutdown`.
    pub ignore_shutdown: bool,
}

/// Builds a `window/logMessage` notification.
pub fn log_message(text: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "window/logMessage",
        "params": {"type": 3, "message": text},
    })
}

/// Launcher connecting sessions to scripted in-memory servers.
///
/// Clones share their records, so a test can keep one while the session
/// owns another.
#[derive(Clone, Default)]
pub struct ScriptedLauncher {
    script: ServerScript,
    launches: Arc<Mutex<Vec<LaunchCommand>>>,
    received: Arc<Mutex<Vec<Value>>>,
    servers: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl ScriptedLauncher {
    /// Builds a launcher whose servers follow `script`.
    pub fn new(script: ServerScript) -> Self {
        Self {
            script,
            ..Self::default()
        }
    }

    /// Commands the session asked to launch.
    pub fn launches(&self) -> Vec<LaunchCommand> {
        self.launches.lock().expect("launches lock").clone()
    }

    /// Every message the server received, in order.
    pub fn received(&self) -> Vec<Value> {
        self.received.lock().expect("received lock").clone()
    }

    /// Methods of requests and notifications the server received.
    pub fn received_methods(&self) -> Vec<String> {
        self.received()
            .iter()
            .filter_map(|message| message.get("method").and_then(Value::as_str))
            .map(str::to_owned)
            .collect()
    }

    /// Params of the first received message with `method`.
    pub fn params_of(&self, method: &str) -> Option<Value> {
        self.received()
            .into_iter()
            .find(|message| message.get("method").and_then(Value::as_str) == Some(method))
            .and_then(|message| message.get("params").cloned())
    }

    /// Replies the client sent to server-initiated requests.
    pub fn replies(&self) -> Vec<Value> {
        self.received()
            .into_iter()
            .filter(|message| message.get("method").is_none())
            .collect()
    }

    /// Waits until the server has received a message with `method`.
    pub async fn wait_for(&self, method: &str) {
        self.wait_until(method, |launcher| {
            launcher.received_methods().iter().any(|seen| seen == method)
        })
        .await;
    }

    /// Waits until the server has received `count` replies.
    pub async fn wait_for_replies(&self, count: usize) {
        self.wait_until("replies", |launcher| launcher.replies().len() >= count)
            .await;
    }

    async fn wait_until(&self, what: &str, done: impl Fn(&Self) -> bool) {
        let arrived = tokio::time::timeout(Duration::from_secs(5), async {
            while !done(self) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(arrived.is_ok(), "server never received {what}");
    }

    /// Waits until every launched server has finished.
    pub async fn finished(&self) {
        let servers: Vec<JoinHandle<()>> =
            self.servers.lock().expect("servers lock").drain(..).collect();
        for server in servers {
            server.await.expect("scripted server panicked");
        }
    }
}

impl SessionLauncher for ScriptedLauncher {
    async fn launch(&self, command: &LaunchCommand) -> Result<LaunchedServer, SessionError> {
        self.launches
            .lock()
            .expect("launches lock")
            .push(command.clone());

        let (client, server) = tokio::io::duplex(64 * 1024);
        let (client_read, client_write) = tokio::io::split(client);
        let handle = tokio::spawn(serve(
            server,
            self.script.clone(),
            Arc::clone(&self.received),
        ));
        self.servers.lock().expect("servers lock").push(handle);

        Ok(LaunchedServer {
            transport: Transport::new(client_read, client_write),
            child: None,
        })
    }
}

async fn serve(stream: DuplexStream, script: ServerScript, received: Arc<Mutex<Vec<Value>>>) {
    let (read, write): (ReadHalf<DuplexStream>, WriteHalf<DuplexStream>) = tokio::io::split(stream);
    let mut reader = FrameReader::new(Box::new(read));
    let mut writer = FrameWriter::new(Box::new(write));

    while let Ok(frame) = reader.read_frame().await {
        let message: Value = serde_json::from_slice(&frame).expect("client sent valid JSON");
        received.lock().expect("received lock").push(message.clone());

        let method = message.get("method").and_then(Value::as_str).unwrap_or("");
        let id = message.get("id").cloned().unwrap_or(Value::Null);
        match method {
            "initialize" => {
                for outgoing in &script.before_initialize_reply {
                    send(&mut writer, outgoing).await;
                }
                if script.silent_initialize {
                    continue;
                }
                let reply = match &script.initialize_error {
                    Some(error) => json!({"jsonrpc": "2.0", "id": id, "error": error}),
                    None => json!({
                        "jsonrpc": "2.0",
                        "id": id,
                        "result": {
                            "capabilities": {},
                            "serverInfo": {"name": "phasor-lsp", "version": "test"},
                        },
                    }),
                };
                send(&mut writer, &reply).await;
            }
            "initialized" => {
                for outgoing in &script.after_initialized {
                    send(&mut writer, outgoing).await;
                }
                if script.close_after_initialized {
                    return;
                }
            }
            "shutdown" if !script.ignore_shutdown => {
                send(&mut writer, &json!({"jsonrpc": "2.0", "id": id, "result": null})).await;
            }
            "exit" => return,
            _ => {}
        }
    }
}

async fn send(writer: &mut FrameWriter, message: &Value) {
    let payload = serde_json::to_vec(message).expect("serialisable message");
    // The client may already have hung up; tests observe that separately.
    writer.write_frame(&payload).await.ok();
}
