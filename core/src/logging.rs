//! Process-wide `tracing` subscriber setup.
//!
//! The executor only emits events; installing a subscriber is the host's
//! call. This helper covers the common case: an `EnvFilter` seeded from the
//! configured level (`RUST_LOG` wins when set), human-readable or JSON lines.

use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl LogConfig {
    /// The configured level, or `INFO` if it does not parse.
    pub fn level_filter(&self) -> LevelFilter {
        self.level.trim().parse().unwrap_or(LevelFilter::INFO)
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::builder()
            .with_default_directive(self.level_filter().into())
            .from_env_lossy()
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(config: &LogConfig) -> Result<(), TryInitError> {
    use tracing_subscriber::util::SubscriberInitExt as _;

    let builder = tracing_subscriber::fmt().with_env_filter(config.env_filter());
    if config.json {
        builder.json().finish().try_init()
    } else {
        builder.finish().try_init()
    }
}
