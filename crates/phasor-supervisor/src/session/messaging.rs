//! JSON-RPC messaging over an open transport.
//!
//! A background task reads frames into a channel so that waiting for the
//! next message can be raced against other events without losing a
//! partially read frame.

use std::collections::VecDeque;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::SESSION_TARGET;
use super::error::{SessionError, TransportError};
use super::events::ServerEvent;
use super::jsonrpc::{
    JsonRpcError, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    RequestIds, ServerRequest,
};
use super::transport::{FrameReader, FrameWriter, Transport};

/// Maximum number of messages inspected while waiting for one response.
pub(super) const MAX_RESPONSE_ITERATIONS: usize = 100;

/// Server requests acknowledged with a null result.
const ACKNOWLEDGED_REQUESTS: &[&str] = &["client/registerCapability", "client/unregisterCapability"];

type Inbound = Result<Vec<u8>, TransportError>;

/// An open JSON-RPC connection to the server.
pub(super) struct Connection {
    writer: FrameWriter,
    inbound: mpsc::UnboundedReceiver<Inbound>,
    pump: JoinHandle<()>,
    ids: RequestIds,
}

impl Connection {
    /// Starts reading from `transport` in the background.
    pub(super) fn open(transport: Transport) -> Self {
        let (reader, writer) = transport.into_split();
        let (sender, inbound) = mpsc::unbounded_channel();
        let pump = tokio::spawn(pump_frames(reader, sender));
        Self {
            writer,
            inbound,
            pump,
            ids: RequestIds::default(),
        }
    }

    /// Sends a request and waits for its response.
    ///
    /// Notifications arriving meanwhile are appended to `pending`; server
    /// requests are answered; responses to other ids are skipped.
    pub(super) async fn request(
        &mut self,
        method: &str,
        params: Option<Value>,
        pending: &mut VecDeque<ServerEvent>,
    ) -> Result<Value, SessionError> {
        let request = JsonRpcRequest::new(self.ids.next_id(), method, params);
        let request_id = request.id;
        debug!(
            target: SESSION_TARGET,
            method,
            id = request_id,
            "sending request"
        );
        self.writer
            .write_frame(&serde_json::to_vec(&request)?)
            .await?;

        let response = self.await_response(request_id, pending).await?;
        match response.error {
            Some(error) => Err(SessionError::from_jsonrpc(error)),
            None => Ok(response.result.unwrap_or(Value::Null)),
        }
    }

    /// Sends a notification.
    pub(super) async fn notify(
        &mut self,
        method: &str,
        params: Option<Value>,
    ) -> Result<(), SessionError> {
        let notification = JsonRpcNotification::new(method, params);
        debug!(target: SESSION_TARGET, method, "sending notification");
        self.writer
            .write_frame(&serde_json::to_vec(&notification)?)
            .await?;
        Ok(())
    }

    /// Receives the next message of any kind.
    pub(super) async fn receive(&mut self) -> Result<JsonRpcMessage, SessionError> {
        let frame = self.inbound.recv().await.ok_or(TransportError::Closed)??;
        Ok(JsonRpcMessage::from_bytes(&frame)?)
    }

    /// Answers a server-initiated request.
    ///
    /// Capability registration is acknowledged; everything else is refused
    /// with method-not-found.
    pub(super) async fn answer(&mut self, request: ServerRequest) -> Result<(), SessionError> {
        let reply = if ACKNOWLEDGED_REQUESTS.contains(&request.method.as_str()) {
            debug!(
                target: SESSION_TARGET,
                method = %request.method,
                "acknowledging server request"
            );
            JsonRpcResponse::success(request.id, Value::Null)
        } else {
            warn!(
                target: SESSION_TARGET,
                method = %request.method,
                "refusing unsupported server request"
            );
            JsonRpcResponse::failure(request.id, JsonRpcError::method_not_found(&request.method))
        };
        self.writer
            .write_frame(&serde_json::to_vec(&reply)?)
            .await?;
        Ok(())
    }

    async fn await_response(
        &mut self,
        request_id: i64,
        pending: &mut VecDeque<ServerEvent>,
    ) -> Result<JsonRpcResponse, SessionError> {
        for _ in 0..MAX_RESPONSE_ITERATIONS {
            match self.receive().await? {
                JsonRpcMessage::Response(response) if response.answers(request_id) => {
                    return Ok(response);
                }
                JsonRpcMessage::Response(response) => {
                    warn!(
                        target: SESSION_TARGET,
                        expected = request_id,
                        received = ?response.id,
                        "skipping response with non-matching ID"
                    );
                }
                JsonRpcMessage::ServerRequest(request) => self.answer(request).await?,
                JsonRpcMessage::Notification(notification) => {
                    debug!(
                        target: SESSION_TARGET,
                        method = %notification.method,
                        "queueing server notification"
                    );
                    pending.push_back(ServerEvent::from_notification(
                        notification.method,
                        notification.params,
                    ));
                }
            }
        }

        warn!(
            target: SESSION_TARGET,
            request_id,
            max_iterations = MAX_RESPONSE_ITERATIONS,
            "giving up on response after reaching maximum iterations"
        );
        Err(SessionError::MaxResponseIterations {
            request_id,
            limit: MAX_RESPONSE_ITERATIONS,
        })
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

async fn pump_frames(mut reader: FrameReader, sender: mpsc::UnboundedSender<Inbound>) {
    loop {
        let frame = reader.read_frame().await;
        let failed = frame.is_err();
        if sender.send(frame).is_err() || failed {
            break;
        }
    }
}
