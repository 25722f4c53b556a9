// Connection settings for the console WebSocket.
//
// Everything the driver needs to open the socket and run the init
// handshake. Built by the session layer; never read from disk here.

use std::fmt;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::error::Error;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 1442;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Where and how to reach the backend.
#[derive(Clone)]
pub struct ConnectionConfig {
    pub host: String,
    /// WebSocket port of the backend.
    pub port: u16,
    /// `wss`/`https` when set, `ws`/`http` otherwise.
    pub secure: bool,
    /// Forwarded verbatim in the init handshake.
    pub username: String,
    /// Forwarded verbatim in the init handshake, never hashed.
    pub password: SecretString,
    /// Per-request timeout, also bounding the handshake.
    pub timeout: Duration,
}

impl Default for ConnectionConfig {
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

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secure", &self.secure)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ConnectionConfig {
    pub fn websocket_url(&self) -> Result<Url, Error> {
        let scheme = if self.secure { "wss" } else { "ws" };
        Ok(Url::parse(&format!("{scheme}://{}:{}", self.host, self.port))?)
    }

    /// Same-origin page address offered to the user after a TLS failure.
    pub fn origin(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }
}
