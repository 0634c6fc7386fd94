//! Configuration loader for the handshake. Loading is split in two: the dotenv
//! file is copied into the process environment first, then `Config` is built
//! from a plain lookup function so the guard itself never touches global state.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use thiserror::Error;
use zeroize::Zeroize;

/// Environment variable holding the mission secret.
pub const SECRET_VAR: &str = "MISSION_SECRET";
/// Optional location of the audit ledger.
pub const LEDGER_PATH_VAR: &str = "VOID_LEDGER_PATH";
/// Optional hex-encoded key that switches ledger hashes to HMAC-SHA256.
pub const LEDGER_KEY_VAR: &str = "VOID_LEDGER_KEY";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required configuration {var} is missing or empty")]
    MissingConfiguration { var: &'static str },
    #[error("configuration {var} is set but is not valid UTF-8")]
    NotUnicode { var: &'static str },
}

/// The mission secret. Read-only once loaded and wiped from memory on drop.
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Where outcomes are recorded, if anywhere. Needed by the ledger commands
/// even when no secret is configured.
#[derive(Debug, Clone, Default)]
pub struct LedgerSettings {
    pub path: Option<PathBuf>,
    pub key: Option<String>,
}

impl LedgerSettings {
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<OsString>,
    {
        Self {
            path: lookup(LEDGER_PATH_VAR)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from),
            // a non-UTF-8 key is kept lossily so opening the ledger rejects it
            key: lookup(LEDGER_KEY_VAR)
                .filter(|value| !value.is_empty())
                .map(|value| value.to_string_lossy().into_owned()),
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var_os(name))
    }
}

#[derive(Debug)]
pub struct Config {
    pub secret: Secret,
    pub ledger: LedgerSettings,
}

impl Config {
    /// Builds the runtime configuration from an arbitrary variable lookup.
    /// An absent or empty secret is a `MissingConfiguration` error; a secret
    /// that is not valid UTF-8 is `NotUnicode`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let raw = lookup(SECRET_VAR)
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::MissingConfiguration { var: SECRET_VAR })?;
        let secret = raw
            .into_string()
            .map(Secret::new)
            .map_err(|_| ConfigError::NotUnicode { var: SECRET_VAR })?;

        let ledger = LedgerSettings::from_lookup(&lookup);

        debug!(
            "configuration loaded (ledger: {}, keyed: {})",
            ledger
                .path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "off".to_string()),
            ledger.key.is_some()
        );

        Ok(Self { secret, ledger })
    }

    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var_os(name))
    }
}

/// Default dotenv file, resolved against the working directory only.
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Copies a dotenv file into the process environment without overriding
/// variables that are already set. With no explicit path, `.env` in the
/// working directory is used when present; parent directories are not searched.
pub fn load_env_file(path: Option<&Path>) {
    match path {
        Some(path) => match dotenvy::from_path(path) {
            Ok(()) => debug!("loaded environment from {}", path.display()),
            Err(err) => warn!("could not load env file {}: {err}", path.display()),
        },
        None => match dotenvy::from_path(DEFAULT_ENV_FILE) {
            Ok(()) => debug!("loaded environment from {DEFAULT_ENV_FILE}"),
            Err(err) if err.not_found() => debug!("no {DEFAULT_ENV_FILE} file found"),
            Err(err) => warn!("could not load {DEFAULT_ENV_FILE}: {err}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<OsString> {
        let vars: HashMap<String, OsString> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), OsString::from(v)))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn loads_secret_and_ledger_settings() {
        let config = Config::from_lookup(lookup_from(&[
            (SECRET_VAR, "VOID-9"),
            (LEDGER_PATH_VAR, "audit/void_ledger.jsonl"),
            (LEDGER_KEY_VAR, "00112233445566778899aabbccddeeff"),
        ]))
        .expect("config should load");

        assert_eq!(config.secret.expose(), "VOID-9");
        assert_eq!(
            config.ledger.path.as_deref(),
            Some(Path::new("audit/void_ledger.jsonl"))
        );
        assert!(config.ledger.key.is_some());
    }

    #[test]
    fn rejects_missing_secret() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert_eq!(err, ConfigError::MissingConfiguration { var: SECRET_VAR });
    }

    #[test]
    fn rejects_empty_secret() {
        let err = Config::from_lookup(lookup_from(&[(SECRET_VAR, "")])).unwrap_err();
        assert!(format!("{err}").contains("MISSION_SECRET"));
    }

    #[cfg(unix)]
    #[test]
    fn rejects_non_unicode_secret() {
        use std::os::unix::ffi::OsStringExt;

        let lookup = |name: &str| {
            (name == SECRET_VAR).then(|| OsString::from_vec(vec![b'V', 0xff, b'9']))
        };
        let err = Config::from_lookup(lookup).unwrap_err();
        assert_eq!(err, ConfigError::NotUnicode { var: SECRET_VAR });
    }

    #[test]
    fn treats_empty_ledger_settings_as_unset() {
        let config = Config::from_lookup(lookup_from(&[
            (SECRET_VAR, "s"),
            (LEDGER_PATH_VAR, ""),
            (LEDGER_KEY_VAR, ""),
        ]))
        .expect("config should load");
        assert!(config.ledger.path.is_none());
        assert!(config.ledger.key.is_none());
    }

    #[test]
    fn ledger_settings_do_not_need_a_secret() {
        let settings = LedgerSettings::from_lookup(lookup_from(&[(LEDGER_PATH_VAR, "l.jsonl")]));
        assert_eq!(settings.path.as_deref(), Some(Path::new("l.jsonl")));
        assert!(settings.key.is_none());
    }

    #[test]
    fn redacts_secret_in_debug_output() {
        let config = Config::from_lookup(lookup_from(&[(SECRET_VAR, "hunter2")])).unwrap();
        let printed = format!("{config:?}");
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("<redacted>"));
    }
}
