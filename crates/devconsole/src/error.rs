//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text.

use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

use devconsole_config::ConfigError;
use devconsole_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const REJECTED: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the console backend")]
    #[diagnostic(
        code(devconsole::connection_failed),
        help(
            "Check that the device is running the debug console and that the host and\n\
             port are right. Reason: {reason}"
        )
    )]
    ConnectionFailed { reason: String },

    #[error("Not connected to the console backend")]
    #[diagnostic(
        code(devconsole::not_connected),
        help("The connection closed before the request could be sent. Try again.")
    )]
    NotConnected,

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(devconsole::auth_failed),
        help(
            "The console password is printed by the device when the console starts.\n\
             Pass it with --ask-password, set DEVCONSOLE_PASSWORD, or add it to the profile."
        )
    )]
    AuthFailed { message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(devconsole::no_credentials),
        help(
            "Set username and password_env in the profile, use --username with\n\
             --ask-password, or set DEVCONSOLE_USERNAME and DEVCONSOLE_PASSWORD."
        )
    )]
    NoCredentials { profile: String },

    // ── Backend answers ──────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(devconsole::not_found),
        help("Run: devconsole {list_command} to see what exists")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("The backend refused: {message}")]
    #[diagnostic(code(devconsole::rejected))]
    Rejected { message: String },

    #[error("{message}")]
    #[diagnostic(code(devconsole::operation_failed))]
    OperationFailed { message: String },

    #[error("Unexpected answer to {call}: {payload}")]
    #[diagnostic(
        code(devconsole::unexpected_response),
        help("The backend may be a different version than this client expects.")
    )]
    UnexpectedResponse { call: String, payload: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(devconsole::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(devconsole::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Add one under [profiles.{name}] in {path}"
        )
    )]
    ProfileNotFound {
        name: String,
        available: String,
        path: String,
    },

    #[error(transparent)]
    #[diagnostic(code(devconsole::config))]
    Config(ConfigError),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Request timed out after {}s", timeout.as_secs_f64())]
    #[diagnostic(
        code(devconsole::timeout),
        help("Increase the timeout with --timeout or check the device's load.")
    )]
    Timeout { timeout: Duration },

    // ── Internal / IO ────────────────────────────────────────────────
    #[error("{0}")]
    #[diagnostic(code(devconsole::internal))]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::NotConnected => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Rejected { .. } | Self::OperationFailed { .. } => exit_code::REJECTED,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::ProfileNotFound { .. } | Self::Config(_) => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { reason } => Self::ConnectionFailed { reason },
            CoreError::AuthenticationFailed { message } => Self::AuthFailed { message },
            CoreError::NotConnected => Self::NotConnected,
            CoreError::Timeout { timeout } => Self::Timeout { timeout },
            CoreError::NotFound {
                entity_type,
                identifier,
            } => Self::NotFound {
                list_command: format!("{}s list", entity_type.to_lowercase()),
                resource_type: entity_type,
                identifier,
            },
            CoreError::Rejected { message } => Self::Rejected { message },
            CoreError::OperationFailed { message } => Self::OperationFailed { message },
            CoreError::UnexpectedResponse { call, payload } => Self::UnexpectedResponse { call, payload },
            CoreError::Config { message } => Self::Validation {
                field: "config".into(),
                reason: message,
            },
            CoreError::Internal(message) => Self::Internal(message),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::ProfileNotFound { name, available } => Self::ProfileNotFound {
                name,
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
                path: devconsole_config::config_path().display().to_string(),
            },
            other => Self::Config(other),
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON serialization failed: {err}"))
    }
}
