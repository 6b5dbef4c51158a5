//! Client side of the control channel, used by a child process that wants
//! its parent session to draw a widget.

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::time::Duration;

use super::protocol::{Request, Response, ENV_TUI_ADDR, ENV_TUI_TOKEN};
use crate::error::TuiError;

/// Widgets wait on a person, so requests get a generous timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct Client {
    addr: String,
    token: String,
    agent: ureq::Agent,
}

impl Client {
    pub fn new(addr: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            addr: addr.into().trim_end_matches('/').to_string(),
            token: token.into(),
            agent: ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build(),
        }
    }

    /// Client for the session this process runs under, if both control
    /// variables are set.
    pub fn from_env() -> Option<Self> {
        let addr = std::env::var(ENV_TUI_ADDR).ok().filter(|v| !v.is_empty())?;
        let token = std::env::var(ENV_TUI_TOKEN).ok().filter(|v| !v.is_empty())?;
        Some(Self::new(addr, token))
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// True when the server answers its health check.
    pub fn is_available(&self) -> bool {
        self.agent
            .get(&format!("{}/health", self.addr))
            .timeout(HEALTH_TIMEOUT)
            .call()
            .is_ok_and(|resp| resp.status() == 200)
    }

    /// Ask the session to show `component` and wait for the user.
    ///
    /// Transport failures, non-200 replies and replies carrying an error all
    /// come back as `Err`; a cancelled widget is an `Ok` response with
    /// `cancelled` set.
    pub fn request(&self, component: &str, options: Value) -> Result<Response> {
        let body = serde_json::to_string(&Request {
            component: component.to_string(),
            options,
        })
        .context("Failed to encode request")?;

        let reply = self
            .agent
            .post(&format!("{}/tui", self.addr))
            .set("Content-Type", "application/json")
            .set("Authorization", &format!("Bearer {}", self.token))
            .send_string(&body);

        let text = match reply {
            Ok(resp) => resp.into_string().context("Failed to read response")?,
            Err(ureq::Error::Status(code, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                return Err(TuiError::Server(format!(
                    "server error ({}): {}",
                    code,
                    body.trim_end()
                ))
                .into());
            }
            Err(e) => return Err(e).context("Failed to send request"),
        };

        let response: Response = serde_json::from_str(&text).context("Failed to parse response")?;
        if !response.error.is_empty() {
            bail!("TUI error: {}", response.error);
        }
        Ok(response)
    }

    /// Like [`Client::request`] but returns the wire result, with a cancelled
    /// widget reported as [`TuiError::Cancelled`].
    pub fn show(&self, component: &str, options: Value) -> Result<Value> {
        let response = self.request(component, options)?;
        if response.cancelled {
            return Err(TuiError::Cancelled.into());
        }
        Ok(response.result.unwrap_or(Value::Null))
    }
}
