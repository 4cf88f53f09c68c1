use crate::traits::LinearBackoff;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Environment variable overriding the endpoint URL
pub const ENV_WS_URL: &str = "REALTIME_WS_URL";
/// Environment variable overriding the maximum reconnect attempts
pub const ENV_MAX_RECONNECT_ATTEMPTS: &str = "REALTIME_MAX_RECONNECT_ATTEMPTS";
/// Environment variable overriding the backoff unit in milliseconds
pub const ENV_RECONNECT_DELAY_MS: &str = "REALTIME_RECONNECT_DELAY_MS";
/// Environment variable toggling frame-level debug logging
pub const ENV_DEBUG: &str = "REALTIME_DEBUG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid value for {name}: {value}")]
    InvalidEnvVar { name: String, value: String },

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Realtime connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// WebSocket endpoint (ws:// or wss://)
    #[serde(default = "default_url")]
    pub url: String,
    /// Reconnect attempts allowed after an abnormal closure
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    /// Backoff unit; the Nth retry waits this many milliseconds times N
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    /// Log every frame sent and received
    #[serde(default)]
    pub debug: bool,
}

fn default_url() -> String {
    "ws://localhost:3001/ws".to_string()
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_reconnect_base_delay_ms() -> u64 {
    3000
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            debug: false,
        }
    }
}

impl RealtimeConfig {
    /// Create a configuration for the given endpoint with default retry settings
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    pub fn with_reconnect_base_delay(mut self, delay: Duration) -> Self {
        self.reconnect_base_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Load configuration from YAML file, then apply environment overrides
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        let mut config: RealtimeConfig = serde_yaml::from_str(&yaml_content)?;

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Build configuration from defaults plus environment (and `.env`)
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Apply `REALTIME_*` environment overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var(ENV_WS_URL) {
            info!("Overriding realtime URL from environment variable");
            self.url = url;
        }

        if let Ok(value) = std::env::var(ENV_MAX_RECONNECT_ATTEMPTS) {
            self.max_reconnect_attempts = parse_env(ENV_MAX_RECONNECT_ATTEMPTS, &value)?;
        }

        if let Ok(value) = std::env::var(ENV_RECONNECT_DELAY_MS) {
            self.reconnect_base_delay_ms = parse_env(ENV_RECONNECT_DELAY_MS, &value)?;
        }

        if let Ok(value) = std::env::var(ENV_DEBUG) {
            self.debug = match value.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                _ => {
                    return Err(ConfigError::InvalidEnvVar {
                        name: ENV_DEBUG.to_string(),
                        value,
                    })
                }
            };
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(ConfigError::ValidationError(format!(
                "url must start with ws:// or wss://, got '{}'",
                self.url
            )));
        }

        if self.reconnect_base_delay_ms == 0 {
            return Err(ConfigError::ValidationError(
                "reconnect_base_delay_ms must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn reconnect_base_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_delay_ms)
    }

    /// Backoff strategy described by this configuration
    pub fn backoff(&self) -> LinearBackoff {
        LinearBackoff::new(self.reconnect_base_delay(), self.max_reconnect_attempts)
    }

    /// Log configuration summary
    pub fn log(&self) {
        info!("Realtime configuration:");
        info!("  URL: {}", self.url);
        info!("  Max reconnect attempts: {}", self.max_reconnect_attempts);
        info!("  Reconnect base delay: {}ms", self.reconnect_base_delay_ms);
        info!("  Debug: {}", self.debug);
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnvVar {
        name: name.to_string(),
        value: value.to_string(),
    })
}
