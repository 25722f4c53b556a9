// ── Runtime session configuration ──
//
// Describes *how* to reach the console backend. Carries credentials and
// tuning, never touches disk. The CLI builds a `SessionConfig` from its
// profile and flags and hands it in.

use std::time::Duration;

use devconsole_api::ConnectionConfig;
use devconsole_api::transport::{DEFAULT_HOST, DEFAULT_PORT, DEFAULT_TIMEOUT};
use secrecy::SecretString;

/// Configuration for one console session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Hostname or address of the device running the backend.
    pub host: String,
    /// WebSocket port of the backend.
    pub port: u16,
    /// Use `wss` instead of `ws`.
    pub secure: bool,
    pub username: String,
    pub password: SecretString,
    /// Per-request timeout. Also bounds the init handshake.
    pub timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            secure: false,
            username: String::new(),
            password: SecretString::from(String::new()),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl From<SessionConfig> for ConnectionConfig {
    fn from(config: SessionConfig) -> Self {
        Self {
            host: config.host,
            port: config.port,
            secure: config.secure,
            username: config.username,
            password: config.password,
            timeout: config.timeout,
        }
    }
}
