//! Plugin configuration resolved from the process environment.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_DAEMON_URL, DEFAULT_LOG_FILTER, ENV_CONNECT_TIMEOUT,
    ENV_DAEMON_URL, ENV_LOG_FILTER, ENV_REQUEST_TIMEOUT,
};
use crate::error::{PodwireError, Result};

/// Settings that are not part of the per-network configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Base URL of the control daemon API.
    pub daemon_url: String,
    /// Upper bound on establishing a connection to the daemon.
    pub connect_timeout: Duration,
    /// Upper bound on a whole daemon request; `None` waits for the answer.
    pub request_timeout: Option<Duration>,
    /// `tracing` filter directive.
    pub log_filter: String,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            daemon_url: DEFAULT_DAEMON_URL.to_string(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            request_timeout: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl PluginConfig {
    /// Resolves the configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `PodwireError::Config` if a timeout variable is not a
    /// whole number of seconds.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves the configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `PodwireError::Config` if a timeout value is malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(url) = lookup(ENV_DAEMON_URL).filter(|v| !v.is_empty()) {
            config.daemon_url = url.trim_end_matches('/').to_string();
        }
        if let Some(raw) = lookup(ENV_CONNECT_TIMEOUT) {
            config.connect_timeout = parse_seconds(ENV_CONNECT_TIMEOUT, &raw)?;
        }
        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT) {
            config.request_timeout = Some(parse_seconds(ENV_REQUEST_TIMEOUT, &raw)?);
        }
        if let Some(filter) = lookup(ENV_LOG_FILTER).filter(|v| !v.is_empty()) {
            config.log_filter = filter;
        }
        Ok(config)
    }
}

fn parse_seconds(key: &str, raw: &str) -> Result<Duration> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| PodwireError::Config {
            message: format!("{key}={raw:?} is not a number of seconds: {e}"),
        })
}
