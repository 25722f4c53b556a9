//! Shared configuration for devconsole front ends.
//!
//! TOML profiles, `DEVCONSOLE_*` environment overrides, credential
//! resolution, and translation to `devconsole_core::SessionConfig`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use devconsole_core::{DEFAULT_HOST, DEFAULT_PORT, DEFAULT_TIMEOUT, SessionConfig};

/// Prefix of every environment variable the config layer reads.
pub const ENV_PREFIX: &str = "DEVCONSOLE_";

/// Password fallback consulted when a profile names no variable of its own.
pub const PASSWORD_ENV: &str = "DEVCONSOLE_PASSWORD";

/// Username fallback for profiles without one.
pub const USERNAME_ENV: &str = "DEVCONSOLE_USERNAME";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{name}' not found")]
    ProfileNotFound { name: String, available: Vec<String> },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named on the command line.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named device profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Profile name to use: the explicit one, else the configured default,
    /// else `"default"`.
    pub fn active_profile_name(&self, explicit: Option<&str>) -> String {
        explicit
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into())
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::ProfileNotFound {
                name: name.to_owned(),
                available: self.profiles.keys().cloned().collect(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    /// `table`, `json` or `yaml`.
    #[serde(default = "default_output")]
    pub output: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

/// One device running the console backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Connect over `wss`.
    #[serde(default)]
    pub secure: bool,

    pub username: Option<String>,

    /// Plaintext password. Prefer `password_env`.
    pub password: Option<String>,

    /// Name of an environment variable holding the password.
    pub password_env: Option<String>,

    /// Overrides `defaults.timeout`.
    pub timeout: Option<u64>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            secure: false,
            username: None,
            password: None,
            password_env: None,
            timeout: None,
        }
    }
}

fn default_host() -> String {
    DEFAULT_HOST.into()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "devconsole", "devconsole").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("devconsole");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config from `path` + environment. A missing file yields defaults.
///
/// Nested keys are addressed with a double underscore, e.g.
/// `DEVCONSOLE_PROFILES__LAB__HOST` or `DEVCONSOLE_DEFAULTS__TIMEOUT`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if it can't be read.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the password: the profile's `password_env` variable, then
/// `DEVCONSOLE_PASSWORD`, then the plaintext in the profile.
pub fn resolve_password(profile: &Profile) -> Option<SecretString> {
    resolve_password_with(profile, |name| std::env::var(name).ok())
}

/// [`resolve_password`] with an injectable environment lookup.
pub fn resolve_password_with(profile: &Profile, env: impl Fn(&str) -> Option<String>) -> Option<SecretString> {
    profile
        .password_env
        .as_deref()
        .and_then(&env)
        .or_else(|| env(PASSWORD_ENV))
        .or_else(|| profile.password.clone())
        .map(SecretString::from)
}

/// Resolve the username: the profile's, then `DEVCONSOLE_USERNAME`.
pub fn resolve_username(profile: &Profile) -> Option<String> {
    profile
        .username
        .clone()
        .or_else(|| std::env::var(USERNAME_ENV).ok())
}

/// Build a `SessionConfig` from a profile, with no command-line overrides.
pub fn profile_to_session_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<SessionConfig, ConfigError> {
    let no_credentials = || ConfigError::NoCredentials {
        profile: profile_name.into(),
    };

    if profile.host.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "host".into(),
            reason: "must not be empty".into(),
        });
    }

    let username = resolve_username(profile).ok_or_else(no_credentials)?;
    let password = resolve_password(profile).ok_or_else(no_credentials)?;
    let timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));

    Ok(SessionConfig {
        host: profile.host.clone(),
        port: profile.port,
        secure: profile.secure,
        username,
        password,
        timeout,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn lookup(vars: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name| {
            vars.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| (*v).to_owned())
        }
    }

    fn with_password(password: Option<&str>, password_env: Option<&str>) -> Profile {
        Profile {
            password: password.map(str::to_owned),
            password_env: password_env.map(str::to_owned),
            ..Profile::default()
        }
    }

    #[test]
    fn profile_variable_wins() {
        let profile = with_password(Some("plain"), Some("LAB_PW"));
        let env = lookup(&[("LAB_PW", "from-profile-var"), (PASSWORD_ENV, "from-global")]);
        let secret = resolve_password_with(&profile, env).unwrap();
        assert_eq!(secret.expose_secret(), "from-profile-var");
    }

    #[test]
    fn unset_profile_variable_falls_through_to_global() {
        let profile = with_password(Some("plain"), Some("LAB_PW"));
        let secret = resolve_password_with(&profile, lookup(&[(PASSWORD_ENV, "from-global")])).unwrap();
        assert_eq!(secret.expose_secret(), "from-global");
    }

    #[test]
    fn plaintext_is_last_resort() {
        let profile = with_password(Some("plain"), None);
        let secret = resolve_password_with(&profile, lookup(&[])).unwrap();
        assert_eq!(secret.expose_secret(), "plain");
        assert!(resolve_password_with(&Profile::default(), lookup(&[])).is_none());
    }

    #[test]
    fn active_profile_prefers_explicit_name() {
        let cfg = Config::default();
        assert_eq!(cfg.active_profile_name(Some("lab")), "lab");
        assert_eq!(cfg.active_profile_name(None), "default");

        let cfg = Config {
            default_profile: None,
            ..Config::default()
        };
        assert_eq!(cfg.active_profile_name(None), "default");
    }

    #[test]
    fn missing_profile_lists_available() {
        let mut cfg = Config::default();
        cfg.profiles.insert("lab".into(), Profile::default());
        cfg.profiles.insert("bench".into(), Profile::default());

        let err = cfg.profile("prod").unwrap_err();
        assert!(matches!(err, ConfigError::ProfileNotFound { available, .. }
            if available == vec!["bench".to_owned(), "lab".to_owned()]));
    }

    #[test]
    fn empty_host_is_rejected() {
        let profile = Profile {
            host: "  ".into(),
            ..Profile::default()
        };
        let err = profile_to_session_config(&profile, "lab", &Defaults::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { field, .. } if field == "host"));
    }
}
