//! Command-line layer over `devconsole-config`: global flags override the
//! selected profile, and the result becomes the `SessionConfig` the core
//! receives.

use std::time::Duration;

use secrecy::SecretString;

use devconsole_config::{Config, Defaults, Profile, resolve_password, resolve_username};
use devconsole_core::SessionConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Build a `SessionConfig` from the config file, profile, and flags.
///
/// A profile named with `--profile` must exist. Without one, a missing
/// default profile is fine: flags and environment alone can describe the
/// device.
pub fn build_session_config(global: &GlobalOpts) -> Result<SessionConfig, CliError> {
    let cfg = devconsole_config::load_config()?;
    let profile_name = cfg.active_profile_name(global.profile.as_deref());
    let profile = select_profile(&cfg, &profile_name, global.profile.is_some())?;
    resolve_profile(&profile, &profile_name, &cfg.defaults, global)
}

fn select_profile(cfg: &Config, name: &str, explicit: bool) -> Result<Profile, CliError> {
    if explicit {
        return Ok(cfg.profile(name)?.clone());
    }
    Ok(cfg.profiles.get(name).cloned().unwrap_or_default())
}

/// Apply flag overrides to `profile`.
pub fn resolve_profile(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
    global: &GlobalOpts,
) -> Result<SessionConfig, CliError> {
    let no_credentials = || CliError::NoCredentials {
        profile: profile_name.into(),
    };

    // 1. Endpoint (flag > env > profile)
    let host = global.host.clone().unwrap_or_else(|| profile.host.clone());
    if host.trim().is_empty() {
        return Err(CliError::Validation {
            field: "host".into(),
            reason: "must not be empty".into(),
        });
    }
    let port = global.port.unwrap_or(profile.port);
    let secure = global.secure || profile.secure;

    // 2. Credentials
    let username = global
        .username
        .clone()
        .or_else(|| resolve_username(profile))
        .ok_or_else(no_credentials)?;
    let password = if global.ask_password {
        prompt_password()?
    } else {
        resolve_password(profile).ok_or_else(no_credentials)?
    };

    // 3. Timeout
    let timeout = Duration::from_secs(global.timeout.or(profile.timeout).unwrap_or(defaults.timeout));
    if timeout.is_zero() {
        return Err(CliError::Validation {
            field: "timeout".into(),
            reason: "must be at least one second".into(),
        });
    }

    Ok(SessionConfig {
        host,
        port,
        secure,
        username,
        password,
        timeout,
    })
}

fn prompt_password() -> Result<SecretString, CliError> {
    let password = rpassword::prompt_password("Console password: ")?;
    if password.is_empty() {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: "cannot be empty".into(),
        });
    }
    Ok(SecretString::from(password))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::Parser;
    use secrecy::ExposeSecret;

    use crate::cli::Cli;

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["devconsole"];
        argv.extend_from_slice(args);
        argv.push("device");
        Cli::try_parse_from(argv).unwrap().global
    }

    fn lab() -> Profile {
        Profile {
            host: "10.0.4.17".into(),
            username: Some("admin".into()),
            password: Some("hunter2".into()),
            timeout: Some(9),
            ..Profile::default()
        }
    }

    #[test]
    fn flags_override_profile() {
        let opts = global(&["--host", "bench.local", "--port", "9000", "--secure", "--timeout", "3"]);
        let cfg = resolve_profile(&lab(), "lab", &Defaults::default(), &opts).unwrap();

        assert_eq!(cfg.host, "bench.local");
        assert_eq!(cfg.port, 9000);
        assert!(cfg.secure);
        assert_eq!(cfg.timeout, Duration::from_secs(3));
        assert_eq!(cfg.username, "admin");
        assert!(!cfg.password.expose_secret().is_empty());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let opts = global(&["--timeout", "0"]);
        let err = resolve_profile(&lab(), "lab", &Defaults::default(), &opts).unwrap_err();
        assert!(matches!(err, CliError::Validation { field, .. } if field == "timeout"));
    }

    #[test]
    fn named_profile_must_exist() {
        let err = select_profile(&Config::default(), "prod", true).unwrap_err();
        assert!(matches!(err, CliError::ProfileNotFound { name, .. } if name == "prod"));

        let fallback = select_profile(&Config::default(), "default", false).unwrap();
        assert_eq!(fallback, Profile::default());
    }
}
