use std::time::Duration;

use thiserror::Error;

/// Top-level error type for the `devconsole-api` crate.
///
/// Covers transport setup, the init handshake, request correlation and
/// payload decoding. `devconsole-core` maps these into user-facing errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The backend answered the init handshake with a failure string.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// No matching response arrived within the configured window.
    #[error("Request timed out in {} seconds", timeout.as_secs_f64())]
    Timeout { timeout: Duration },

    /// A request was attempted while the socket was not open.
    #[error("WebSocket not connected")]
    NotConnected,

    // ── WebSocket ───────────────────────────────────────────────────
    /// The connection closed while the request was pending, or before
    /// the handshake completed.
    #[error("Connection closed: {reason}")]
    ConnectionClosed { reason: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// JSON encoding of an outbound request failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns `true` if the error means the connection is gone for good.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::ConnectionClosed { .. } | Self::Authentication { .. } | Self::NotConnected
        )
    }
}
