//! Runtime configuration resolved from environment variables.
//!
//! # Invariants
//! - Unset or blank variables fall back to defaults.
//! - Malformed values are rejected, never silently replaced.

use crate::auth::{DEFAULT_CODE_TTL, DEFAULT_SESSION_TTL};
use crate::logging::default_log_level;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

pub const DB_PATH_ENV: &str = "GOALS_PORTAL_DB_PATH";
pub const CODE_TTL_ENV: &str = "GOALS_PORTAL_OTP_TTL_SECS";
pub const SESSION_TTL_ENV: &str = "GOALS_PORTAL_SESSION_TTL_SECS";
pub const LOG_LEVEL_ENV: &str = "GOALS_PORTAL_LOG_LEVEL";

const DEFAULT_DB_FILE_NAME: &str = "goals_portal.sqlite3";

/// Resolved portal settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalConfig {
    pub db_path: PathBuf,
    pub code_ttl: Duration,
    pub session_ttl: Duration,
    pub log_level: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue { key: &'static str, value: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, value } => write!(f, "invalid value for {key}: `{value}`"),
        }
    }
}

impl Error for ConfigError {}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            db_path: std::env::temp_dir().join(DEFAULT_DB_FILE_NAME),
            code_ttl: DEFAULT_CODE_TTL,
            session_ttl: DEFAULT_SESSION_TTL,
            log_level: default_log_level().to_string(),
        }
    }
}

impl PortalConfig {
    /// Reads settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`, which maps variable names to values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();

        if let Some(path) = read(DB_PATH_ENV) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(raw) = read(CODE_TTL_ENV) {
            config.code_ttl = positive_secs(CODE_TTL_ENV, raw)?;
        }
        if let Some(raw) = read(SESSION_TTL_ENV) {
            config.session_ttl = positive_secs(SESSION_TTL_ENV, raw)?;
        }
        if let Some(level) = read(LOG_LEVEL_ENV) {
            config.log_level = level;
        }
        Ok(config)
    }
}

fn positive_secs(key: &'static str, raw: String) -> Result<Duration, ConfigError> {
    match raw.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidValue { key, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, PortalConfig, CODE_TTL_ENV, DB_PATH_ENV, SESSION_TTL_ENV};
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset_or_blank() {
        let config = PortalConfig::from_lookup(lookup(&[(DB_PATH_ENV, "  ")])).expect("config");
        assert_eq!(config, PortalConfig::default());
    }

    #[test]
    fn reads_overrides() {
        let config = PortalConfig::from_lookup(lookup(&[
            (DB_PATH_ENV, "/var/lib/portal.db"),
            (CODE_TTL_ENV, "90"),
            (SESSION_TTL_ENV, "3600"),
        ]))
        .expect("config");
        assert_eq!(config.db_path, PathBuf::from("/var/lib/portal.db"));
        assert_eq!(config.code_ttl, Duration::from_secs(90));
        assert_eq!(config.session_ttl, Duration::from_secs(3600));
    }

    #[test]
    fn rejects_malformed_ttl() {
        for key in [CODE_TTL_ENV, SESSION_TTL_ENV] {
            for raw in ["soon", "0", "-5"] {
                let err = PortalConfig::from_lookup(lookup(&[(key, raw)]))
                    .expect_err("malformed ttl must fail");
                assert_eq!(
                    err,
                    ConfigError::InvalidValue {
                        key,
                        value: raw.to_string(),
                    }
                );
            }
        }
    }
}
