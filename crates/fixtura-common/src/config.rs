//! Global configuration model for fixture creation.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{FixturaError, Result};

/// Root configuration shared by every fixture created through one engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixturaConfig {
    /// Explicit path to the Docker CLI; looked up on `PATH` when unset.
    pub docker_binary: Option<PathBuf>,
    /// Prefix prepended to every instance name.
    pub namespace_prefix: String,
    /// Delay between two readiness polls.
    pub poll_interval: Duration,
    /// Upper bound on the readiness wait. `None` waits forever.
    pub ready_timeout: Option<Duration>,
    /// Expiry scheduled for every fixture as soon as its container starts,
    /// before the readiness wait.
    pub default_expiry: Option<Duration>,
    /// Host substituted for unspecified bind addresses in endpoints.
    pub host: String,
}

impl Default for FixturaConfig {
    fn default() -> Self {
        Self {
            docker_binary: None,
            namespace_prefix: constants::DEFAULT_NAMESPACE_PREFIX.to_string(),
            poll_interval: Duration::from_millis(constants::DEFAULT_POLL_INTERVAL_MS),
            ready_timeout: None,
            default_expiry: None,
            host: constants::DEFAULT_HOST.to_string(),
        }
    }
}

impl FixturaConfig {
    /// Builds a configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `FixturaError::Config` if a numeric variable cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    ///
    /// Unset and empty values keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns `FixturaError::Config` if a numeric variable cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(path) = get(constants::ENV_DOCKER) {
            config.docker_binary = Some(PathBuf::from(path));
        }
        if let Some(prefix) = get(constants::ENV_PREFIX) {
            config.namespace_prefix = prefix;
        }
        if let Some(ms) = get(constants::ENV_POLL_INTERVAL_MS) {
            config.poll_interval = Duration::from_millis(parse_u64(constants::ENV_POLL_INTERVAL_MS, &ms)?);
        }
        if let Some(secs) = get(constants::ENV_READY_TIMEOUT_SECS) {
            config.ready_timeout = Some(Duration::from_secs(parse_u64(
                constants::ENV_READY_TIMEOUT_SECS,
                &secs,
            )?));
        }
        if let Some(secs) = get(constants::ENV_EXPIRE_SECS) {
            config.default_expiry = Some(Duration::from_secs(parse_u64(
                constants::ENV_EXPIRE_SECS,
                &secs,
            )?));
        }
        if let Some(host) = get(constants::ENV_HOST) {
            config.host = host;
        }

        Ok(config)
    }
}

fn parse_u64(key: &str, value: &str) -> Result<u64> {
    value.trim().parse().map_err(|_| FixturaError::Config {
        message: format!("{key} must be a non-negative integer, got {value:?}"),
    })
}
