//! Startup configuration, read from the environment (and `.env`).

use crate::api::ApiClient;
use crate::fetch::BasicClient;
use crate::fetch::auth::{ApiKey, ApiKeyError};
use crate::orchestrator::{DEFAULT_REFRESH_INTERVAL, RefreshOptions, RefreshOrdering};
use reqwest::Url;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} is not a valid URL: {reason}")]
    InvalidUrl { var: &'static str, reason: String },
    #[error("{var} must be {expected}, got '{value}'")]
    InvalidValue {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
    #[error(transparent)]
    ApiKey(#[from] ApiKeyError),
    #[error("could not build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Backend client stack used in production.
pub type FleetClient = ApiClient<ApiKey<BasicClient>>;

#[derive(Clone)]
pub struct DashboardConfig {
    pub api_url: Url,
    pub api_key: String,
    pub request_timeout: Duration,
    pub refresh: RefreshOptions,
}

// Hand-written so the key never ends up in logs.
impl std::fmt::Debug for DashboardConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardConfig")
            .field("api_url", &self.api_url.as_str())
            .field("api_key_set", &!self.api_key.is_empty())
            .field("request_timeout", &self.request_timeout)
            .field("refresh", &self.refresh)
            .finish()
    }
}

impl DashboardConfig {
    /// Reads `FLEET_API_URL`, `FLEET_API_KEY`, `FLEET_REFRESH_SECS`,
    /// `FLEET_TIMEOUT_SECS` and `FLEET_REFRESH_ORDERING`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_url = lookup("FLEET_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_url = Url::parse(&raw_url).map_err(|e| ConfigError::InvalidUrl {
            var: "FLEET_API_URL",
            reason: e.to_string(),
        })?;

        let interval = match lookup("FLEET_REFRESH_SECS") {
            Some(v) => Duration::from_secs(parse_secs("FLEET_REFRESH_SECS", &v)?),
            None => DEFAULT_REFRESH_INTERVAL,
        };
        let request_timeout = match lookup("FLEET_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(parse_secs("FLEET_TIMEOUT_SECS", &v)?),
            None => DEFAULT_TIMEOUT,
        };
        let ordering = match lookup("FLEET_REFRESH_ORDERING") {
            Some(v) => v.parse().map_err(|_| ConfigError::InvalidValue {
                var: "FLEET_REFRESH_ORDERING",
                expected: "'completion' or 'sequenced'",
                value: v,
            })?,
            None => RefreshOrdering::default(),
        };

        Ok(Self {
            api_url,
            api_key: lookup("FLEET_API_KEY").unwrap_or_default(),
            request_timeout,
            refresh: RefreshOptions { interval, ordering },
        })
    }

    /// Builds the HTTP client stack: timeouts plus the `X-API-KEY` header.
    pub fn client(&self) -> Result<FleetClient, ConfigError> {
        let http = ApiKey::x_api_key(BasicClient::new(self.request_timeout)?, &self.api_key)?;
        Ok(ApiClient::new(http, self.api_url.clone()))
    }
}

fn parse_secs(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(ConfigError::InvalidValue {
            var,
            expected: "a positive number of seconds",
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<DashboardConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DashboardConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.api_url.as_str(), "http://127.0.0.1:8000/");
        assert_eq!(cfg.api_key, "");
        assert_eq!(cfg.refresh.interval, Duration::from_secs(60));
        assert_eq!(cfg.refresh.ordering, RefreshOrdering::CompletionOrder);
        assert_eq!(cfg.request_timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            ("FLEET_API_URL", "https://fleet.example.com/api"),
            ("FLEET_API_KEY", "secret"),
            ("FLEET_REFRESH_SECS", "15"),
            ("FLEET_REFRESH_ORDERING", "sequenced"),
        ])
        .unwrap();
        assert_eq!(cfg.api_url.as_str(), "https://fleet.example.com/api");
        assert_eq!(cfg.refresh.interval, Duration::from_secs(15));
        assert_eq!(cfg.refresh.ordering, RefreshOrdering::Sequenced);
        assert!(!format!("{cfg:?}").contains("secret"));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            config(&[("FLEET_API_URL", "not a url")]),
            Err(ConfigError::InvalidUrl { .. })
        ));
        assert!(matches!(
            config(&[("FLEET_REFRESH_SECS", "0")]),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            config(&[("FLEET_REFRESH_ORDERING", "random")]),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
