//! Shared helpers for command handlers.

use std::io::Read;
use std::path::Path;

use crate::error::CliError;

/// Read a text argument from a file, or from stdin when the path is `-`.
pub fn read_text(path: &Path) -> Result<String, CliError> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        return Ok(buf);
    }
    Ok(std::fs::read_to_string(path)?)
}

/// Check that `text` parses as YAML before it is sent anywhere.
pub fn validate_yaml(field: &str, text: &str) -> Result<(), CliError> {
    serde_yaml::from_str::<serde_yaml::Value>(text)
        .map(drop)
        .map_err(|e| CliError::Validation {
            field: field.into(),
            reason: format!("invalid YAML: {e}"),
        })
}

/// Wait for Ctrl-C, or for the session to close underneath us.
pub async fn until_interrupted(session: &devconsole_core::Session) -> Result<(), CliError> {
    let mut state = session.watch_state();
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            Ok(())
        }
        closed = state.wait_for(devconsole_core::ConnectionState::is_closed) => {
            let reason = match closed.as_deref() {
                Ok(devconsole_core::ConnectionState::ClosedError { reason, .. }) => reason.clone(),
                _ => "the connection closed".into(),
            };
            Err(CliError::ConnectionFailed { reason })
        }
    }
}
