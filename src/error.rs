//! # Error Taxonomy
//!
//! Typed errors for the parts of the crate where callers need to tell failure
//! kinds apart. Session entry points return `anyhow::Result` and wrap these
//! with context; use `downcast_ref::<TuiError>()` to recover the kind.
//!
//! | Kind | Raised by | Fatal to the session |
//! |------|-----------|----------------------|
//! | [`TuiError::Cancelled`] | any widget on Esc / Ctrl+C | no |
//! | [`TuiError::UnknownComponent`] | component construction | no (reported to requester) |
//! | [`TuiError::InvalidOptions`] | component construction | no (reported to requester) |
//! | [`TuiError::PtyAllocation`] | PTY bridge startup | yes |
//! | [`TuiError::ProcessStart`] | PTY bridge startup | yes |
//! | [`TuiError::Server`] | control channel | yes |

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TuiError {
    /// The user dismissed the widget with a cancel key.
    #[error("cancelled by user")]
    Cancelled,

    #[error("unknown component type: {0}")]
    UnknownComponent(String),

    #[error("invalid {kind} options: {source}")]
    InvalidOptions {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to allocate PTY: {0}")]
    PtyAllocation(String),

    #[error("failed to start process: {0}")]
    ProcessStart(String),

    #[error("control server error: {0}")]
    Server(String),
}

impl TuiError {
    /// Returns true when this error represents a user cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TuiError::Cancelled)
    }
}

/// Returns true if any error in the chain is [`TuiError::Cancelled`].
pub fn is_cancellation(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|e| e.downcast_ref::<TuiError>().is_some_and(TuiError::is_cancelled))
}
