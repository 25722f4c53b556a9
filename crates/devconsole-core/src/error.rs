// ── Core error types ──
//
// User-facing errors from devconsole-core. Consumers never see close
// frames or envelope parse failures directly; the `From<devconsole_api::Error>`
// impl translates transport-layer errors into session-level variants.

use std::time::Duration;

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to console backend: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("WebSocket not connected")]
    NotConnected,

    #[error("Request timed out in {} seconds", timeout.as_secs_f64())]
    Timeout { timeout: Duration },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    #[error("Unexpected response to {call}: {payload}")]
    UnexpectedResponse { call: String, payload: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Operation rejected by backend: {message}")]
    Rejected { message: String },

    #[error("Operation failed: {message}")]
    OperationFailed { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether the session is unusable after this error.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. } | Self::AuthenticationFailed { .. } | Self::NotConnected
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<devconsole_api::Error> for CoreError {
    fn from(err: devconsole_api::Error) -> Self {
        use devconsole_api::Error as ApiError;

        match err {
            ApiError::Authentication { message } => CoreError::AuthenticationFailed { message },
            ApiError::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            ApiError::Timeout { timeout } => CoreError::Timeout { timeout },
            ApiError::NotConnected => CoreError::NotConnected,
            ApiError::ConnectionClosed { reason } => CoreError::ConnectionFailed { reason },
            ApiError::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
            ApiError::Json(e) => CoreError::Internal(format!("JSON error: {e}")),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Internal(format!("JSON error: {err}"))
    }
}
