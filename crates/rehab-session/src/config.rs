//! Session configuration.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

pub const ENV_API_URL: &str = "REHAB_API_URL";
pub const ENV_USER_ID: &str = "REHAB_USER_ID";
pub const ENV_AGENT_MARKER: &str = "REHAB_AGENT_MARKER";
pub const ENV_SPEAKING_TIMEOUT_MS: &str = "REHAB_SPEAKING_TIMEOUT_MS";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "REHAB_REQUEST_TIMEOUT_MS";

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_USER_ID: &str = "patient-001";
pub const DEFAULT_AGENT_MARKER: &str = "agent";
pub const DEFAULT_CALL_TYPE: &str = "default";

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Settings for a [`crate::SessionController`] and its HTTP backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionConfig {
    /// Backend base URL, without a trailing slash.
    pub api_base_url: String,
    /// Identity the local participant joins as.
    pub local_user_id: String,
    /// Substring identifying the coaching agent in a user id.
    pub agent_marker: String,
    pub call_type: String,
    /// How long an agent utterance keeps the speaking flag set.
    pub speaking_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            local_user_id: DEFAULT_USER_ID.to_string(),
            agent_marker: DEFAULT_AGENT_MARKER.to_string(),
            call_type: DEFAULT_CALL_TYPE.to_string(),
            speaking_timeout: Duration::from_secs(3),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl SessionConfig {
    /// Read settings from the process environment.
    ///
    /// # Errors
    /// Returns error if a variable is set to an unusable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`. Unset or blank keys keep their defaults.
    ///
    /// # Errors
    /// Returns error if a variable is set to an unusable value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::default();

        if let Some(url) = get(ENV_API_URL) {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::Invalid {
                    key: ENV_API_URL,
                    value: url,
                    reason: "expected an http or https URL",
                });
            }
            config.api_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(user_id) = get(ENV_USER_ID) {
            config.local_user_id = user_id;
        }
        if let Some(marker) = get(ENV_AGENT_MARKER) {
            config.agent_marker = marker;
        }
        if let Some(raw) = get(ENV_SPEAKING_TIMEOUT_MS) {
            config.speaking_timeout = parse_millis(ENV_SPEAKING_TIMEOUT_MS, raw)?;
        }
        if let Some(raw) = get(ENV_REQUEST_TIMEOUT_MS) {
            config.request_timeout = parse_millis(ENV_REQUEST_TIMEOUT_MS, raw)?;
        }
        Ok(config)
    }
}

fn parse_millis(key: &'static str, raw: String) -> Result<Duration, ConfigError> {
    match raw.parse::<u64>() {
        Ok(0) => Err(ConfigError::Invalid {
            key,
            value: raw,
            reason: "must be greater than zero",
        }),
        Ok(ms) => Ok(Duration::from_millis(ms)),
        Err(_) => Err(ConfigError::Invalid {
            key,
            value: raw,
            reason: "expected milliseconds",
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tokio_test::{assert_err, assert_ok};

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = assert_ok!(SessionConfig::from_lookup(lookup(&[])));
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.api_base_url, "http://localhost:8000");
        assert_eq!(config.local_user_id, "patient-001");
        assert_eq!(config.speaking_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_overrides() {
        let config = assert_ok!(SessionConfig::from_lookup(lookup(&[
            (ENV_API_URL, "https://rehab.example.com/"),
            (ENV_USER_ID, "patient-042"),
            (ENV_SPEAKING_TIMEOUT_MS, "1500"),
            (ENV_AGENT_MARKER, "  "),
        ])));
        assert_eq!(config.api_base_url, "https://rehab.example.com");
        assert_eq!(config.local_user_id, "patient-042");
        assert_eq!(config.speaking_timeout, Duration::from_millis(1500));
        assert_eq!(config.agent_marker, DEFAULT_AGENT_MARKER);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = assert_err!(SessionConfig::from_lookup(lookup(&[(
            ENV_SPEAKING_TIMEOUT_MS,
            "soon"
        )])));
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: ENV_SPEAKING_TIMEOUT_MS,
                ..
            }
        ));

        assert_err!(SessionConfig::from_lookup(lookup(&[(ENV_REQUEST_TIMEOUT_MS, "0")])));
        assert_err!(SessionConfig::from_lookup(lookup(&[(ENV_API_URL, "localhost:8000")])));
    }
}
