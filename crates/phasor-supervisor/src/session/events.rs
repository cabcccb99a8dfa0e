//! Notifications received from the language server.

use lsp_types::notification::{LogMessage, Notification, PublishDiagnostics, ShowMessage};
use lsp_types::{LogMessageParams, PublishDiagnosticsParams, ShowMessageParams};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A server notification delivered to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// `window/logMessage`.
    Log(LogMessageParams),
    /// `window/showMessage`.
    Show(ShowMessageParams),
    /// `textDocument/publishDiagnostics`.
    Diagnostics(PublishDiagnosticsParams),
    /// Any other notification, or a known one with unreadable params.
    Other {
        /// Notification method.
        method: String,
        /// Raw parameters.
        params: Option<Value>,
    },
}

impl ServerEvent {
    /// Interprets a notification by method.
    #[must_use]
    pub fn from_notification(method: String, params: Option<Value>) -> Self {
        let parsed = match method.as_str() {
            LogMessage::METHOD => decode(params.as_ref()).map(Self::Log),
            ShowMessage::METHOD => decode(params.as_ref()).map(Self::Show),
            PublishDiagnostics::METHOD => decode(params.as_ref()).map(Self::Diagnostics),
            _ => None,
        };
        parsed.unwrap_or(Self::Other { method, params })
    }

    /// Text the status sink should show for this event, if any.
    #[must_use]
    pub fn sink_text(&self) -> Option<&str> {
        match self {
            Self::Log(params) => Some(params.message.as_str()),
            Self::Show(params) => Some(params.message.as_str()),
            Self::Diagnostics(_) | Self::Other { .. } => None,
        }
    }

    /// Method name of the underlying notification.
    #[must_use]
    pub fn method(&self) -> &str {
        match self {
            Self::Log(_) => LogMessage::METHOD,
            Self::Show(_) => ShowMessage::METHOD,
            Self::Diagnostics(_) => PublishDiagnostics::METHOD,
            Self::Other { method, .. } => method.as_str(),
        }
    }
}

fn decode<T: DeserializeOwned>(params: Option<&Value>) -> Option<T> {
    params.and_then(|value| serde_json::from_value(value.clone()).ok())
}
