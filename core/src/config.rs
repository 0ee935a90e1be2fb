//! Executor configuration.
//!
//! Every field has a default so the struct can be embedded in a larger
//! application config and deserialized from a partial table. Loading from
//! the environment never fails; bad values fall back to the defaults.

use std::time::Duration;

use serde::Deserialize;

use crate::types::DEFAULT_TIMEOUT;

pub const ENV_DEFAULT_TIMEOUT_MS: &str = "OUTBOUND_DEFAULT_TIMEOUT_MS";
pub const ENV_SUCCESS_STATUS: &str = "OUTBOUND_SUCCESS_STATUS";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Timeout applied when a call sets none, or sets a non-positive one.
    pub default_timeout_ms: u64,
    /// The one status code treated as success.
    pub success_status: u16,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: u64::try_from(DEFAULT_TIMEOUT.as_millis()).unwrap_or(u64::MAX),
            success_status: 200,
        }
    }
}

impl ExecutorConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            default_timeout_ms: lookup(ENV_DEFAULT_TIMEOUT_MS)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.default_timeout_ms),
            success_status: lookup(ENV_SUCCESS_STATUS)
                .and_then(|v| v.trim().parse().ok())
                .filter(|s| (100..=599).contains(s))
                .unwrap_or(defaults.success_status),
        }
    }

    /// Default timeout as a `Duration`; zero means the built-in default.
    pub fn default_timeout(&self) -> Duration {
        match self.default_timeout_ms {
            0 => DEFAULT_TIMEOUT,
            ms => Duration::from_millis(ms),
        }
    }
}
