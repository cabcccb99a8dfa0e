//! Error types for the language server session.

use std::io;
use std::sync::Arc;

use thiserror::Error;

use super::jsonrpc::JsonRpcError;
use super::state::SessionState;
use crate::errors::ConfigurationError;

/// Errors raised while starting, running, or stopping a server session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The configured server executable did not resolve.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Failed to spawn the language server process.
    #[error("failed to spawn language server {command}: {source}")]
    SpawnFailed {
        /// Program that could not be started.
        command: String,
        /// The underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// Transport-level failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// JSON serialization or deserialization failed.
    #[error("JSON codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// The server answered a request with an error.
    #[error("server returned error: {message} (code: {code})")]
    Server {
        /// The JSON-RPC error code.
        code: i64,
        /// The error message from the server.
        message: String,
    },

    /// An operation did not finish in time.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        /// Operation that timed out.
        operation: &'static str,
        /// The timeout in milliseconds.
        timeout_ms: u128,
    },

    /// The initialisation handshake could not be completed.
    #[error("initialization failed: {message}")]
    Handshake {
        /// Description of the failure.
        message: String,
    },

    /// No transport is open.
    #[error("language server is not connected")]
    NotConnected,

    /// The operation is not allowed in the current state.
    #[error("cannot {operation} while the session is {state}")]
    InvalidState {
        /// Operation that was attempted.
        operation: &'static str,
        /// State the session was in.
        state: SessionState,
    },

    /// Too many unrelated messages arrived while awaiting a response.
    #[error("no response to request {request_id} after {limit} messages")]
    MaxResponseIterations {
        /// Request that went unanswered.
        request_id: i64,
        /// Number of messages inspected.
        limit: usize,
    },
}

impl SessionError {
    /// Creates a server error from a JSON-RPC error object.
    #[must_use]
    pub fn from_jsonrpc(error: JsonRpcError) -> Self {
        Self::Server {
            code: error.code,
            message: error.message,
        }
    }
}

/// Transport-layer errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// I/O error during read or write.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The peer closed the stream.
    #[error("connection closed by the language server")]
    Closed,

    /// A header block ended without `Content-Length`.
    #[error("missing Content-Length header")]
    MissingContentLength,

    /// A `Content-Length` header carried an unusable value.
    #[error("invalid header: {line}")]
    InvalidHeader {
        /// The offending header line.
        line: String,
    },
}
