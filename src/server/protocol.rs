//! Wire types for the control channel.
//!
//! ```text
//! POST /tui   {"component": "confirm", "options": {"title": "Deploy?"}}
//!   200       {"result": {"confirmed": true}}
//!   200       {"cancelled": true}
//!   200       {"error": "failed to create component: unknown component type: slider"}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::mpsc::Sender;

/// Address of the control server, `http://127.0.0.1:<port>`.
pub const ENV_TUI_ADDR: &str = "TUIBRIDGE_TUI_ADDR";
/// Bearer token the control server expects.
pub const ENV_TUI_TOKEN: &str = "TUIBRIDGE_TUI_TOKEN";

/// Body of `POST /tui`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub component: String,
    #[serde(default)]
    pub options: Value,
}

/// Reply to `POST /tui`. Absent fields are omitted on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cancelled: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl Response {
    pub fn result(result: Value) -> Self {
        Self {
            result: Some(result),
            ..Self::default()
        }
    }

    pub fn cancelled() -> Self {
        Self {
            cancelled: true,
            ..Self::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            ..Self::default()
        }
    }
}

/// A component request handed from the server to an execution bridge.
///
/// The bridge answers exactly once through `respond`.
#[derive(Debug)]
pub struct OverlayRequest {
    pub component: String,
    pub options: Value,
    pub respond: Sender<Response>,
}

impl OverlayRequest {
    /// Send `response` to the waiting requester. A requester that already
    /// gave up is not an error.
    pub fn reply(self, response: Response) {
        if self.respond.send(response).is_err() {
            tracing::debug!(component = %self.component, "requester went away before the reply");
        }
    }
}
