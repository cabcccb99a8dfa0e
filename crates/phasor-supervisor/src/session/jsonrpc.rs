//! JSON-RPC 2.0 message types for the language server transport.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol version carried by every message.
const JSONRPC_VERSION: &str = "2.0";

/// Error code for requests the client does not implement.
pub const METHOD_NOT_FOUND: i64 = -32601;

/// Per-session request identifier generator.
///
/// Identifiers start at 1 and increase monotonically.
#[derive(Debug)]
pub struct RequestIds {
    next: i64,
}

impl Default for RequestIds {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl RequestIds {
    /// Returns the next identifier.
    pub const fn next_id(&mut self) -> i64 {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// A JSON-RPC 2.0 request message.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    /// Protocol version, always "2.0".
    pub jsonrpc: &'static str,
    /// Request identifier.
    pub id: i64,
    /// The method to invoke.
    pub method: String,
    /// Optional parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Creates a request with the given identifier.
    #[must_use]
    pub fn new(id: i64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 notification (no response expected).
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification {
    /// Protocol version, always "2.0".
    pub jsonrpc: &'static str,
    /// The method to invoke.
    pub method: String,
    /// Optional parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    /// Creates a new notification.
    #[must_use]
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 response message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version.
    pub jsonrpc: String,
    /// Identifier of the request being answered.
    pub id: Option<Value>,
    /// The result on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// The error on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Successful reply to a server-initiated request.
    #[must_use]
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: String::from(JSONRPC_VERSION),
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    /// Error reply to a server-initiated request.
    #[must_use]
    pub fn failure(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: String::from(JSONRPC_VERSION),
            id: Some(id),
            result: None,
            error: Some(error),
        }
    }

    /// Whether this response answers request `id`.
    #[must_use]
    pub fn answers(&self, id: i64) -> bool {
        self.id.as_ref().and_then(Value::as_i64) == Some(id)
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i64,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Error for a request method the client does not handle.
    #[must_use]
    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: METHOD_NOT_FOUND,
            message: format!("method not found: {method}"),
            data: None,
        }
    }
}

/// A request initiated by the server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerRequest {
    /// Identifier chosen by the server; may be a number or a string.
    pub id: Value,
    /// Requested method.
    pub method: String,
    /// Optional parameters.
    #[serde(default)]
    pub params: Option<Value>,
}

/// A notification sent by the server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerNotification {
    /// Notification method.
    pub method: String,
    /// Optional parameters.
    #[serde(default)]
    pub params: Option<Value>,
}

/// Any message received from the server.
#[derive(Debug, Clone)]
pub enum JsonRpcMessage {
    /// Reply to one of our requests.
    Response(JsonRpcResponse),
    /// Request the server expects us to answer.
    ServerRequest(ServerRequest),
    /// One-way message from the server.
    Notification(ServerNotification),
}

impl JsonRpcMessage {
    /// Classifies a raw payload by the presence of `method` and `id`.
    ///
    /// # Errors
    ///
    /// Returns the codec error when the payload is not a valid message.
    pub fn from_bytes(payload: &[u8]) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_slice(payload)?;
        let has_method = value.get("method").is_some();
        let has_id = value.get("id").is_some_and(|id| !id.is_null());
        match (has_method, has_id) {
            (true, true) => serde_json::from_value(value).map(Self::ServerRequest),
            (true, false) => serde_json::from_value(value).map(Self::Notification),
            (false, _) => serde_json::from_value(value).map(Self::Response),
        }
    }
}
