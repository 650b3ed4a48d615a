//! Client configuration.
//!
//! Defaults match the tutor backend's local dev setup. `from_env` lets the
//! terminal client and deployments override them without code changes.

use std::time::Duration;

use thiserror::Error;
use url::Url;

pub const DEFAULT_WS_URL: &str = "ws://localhost:8765";
pub const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 3_000;
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

pub const ENV_WS_URL: &str = "SOCRATES_WS_URL";
/// Legacy name used by the web frontend's build scripts.
pub const ENV_WS_URL_LEGACY: &str = "VITE_WS_URL";
pub const ENV_RECONNECT_INTERVAL_MS: &str = "SOCRATES_RECONNECT_INTERVAL_MS";
pub const ENV_MAX_RECONNECT_ATTEMPTS: &str = "SOCRATES_MAX_RECONNECT_ATTEMPTS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid WebSocket URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported URL scheme {0:?} (expected ws or wss)")]
    UnsupportedScheme(String),

    #[error("{key} must be a non-negative integer, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub url: String,
    /// Fixed delay before every reconnect attempt
    pub reconnect_interval: Duration,
    pub max_reconnect_attempts: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_WS_URL.to_string(),
            reconnect_interval: Duration::from_millis(DEFAULT_RECONNECT_INTERVAL_MS),
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
        }
    }
}

impl ClientConfig {
    /// Config for `url` with default reconnect policy.
    pub fn new(url: impl Into<String>) -> Result<Self, ConfigError> {
        let url = url.into();
        validate_url(&url)?;
        Ok(Self {
            url,
            ..Self::default()
        })
    }

    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Load from the process environment, after reading `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = match lookup(ENV_WS_URL).or_else(|| lookup(ENV_WS_URL_LEGACY)) {
            Some(url) => Self::new(url)?,
            None => Self::default(),
        };

        if let Some(value) = lookup(ENV_RECONNECT_INTERVAL_MS) {
            let ms = parse_number::<u64>(ENV_RECONNECT_INTERVAL_MS, &value)?;
            config.reconnect_interval = Duration::from_millis(ms);
        }
        if let Some(value) = lookup(ENV_MAX_RECONNECT_ATTEMPTS) {
            config.max_reconnect_attempts = parse_number(ENV_MAX_RECONNECT_ATTEMPTS, &value)?;
        }

        Ok(config)
    }
}

fn validate_url(url: &str) -> Result<(), ConfigError> {
    let parsed = Url::parse(url).map_err(|source| ConfigError::InvalidUrl {
        url: url.to_string(),
        source,
    })?;
    match parsed.scheme() {
        "ws" | "wss" => Ok(()),
        other => Err(ConfigError::UnsupportedScheme(other.to_string())),
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidNumber {
            key,
            value: value.to_string(),
        })
}
