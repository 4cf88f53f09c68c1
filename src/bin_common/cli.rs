//! CLI utilities for binaries
//!
//! Handles configuration loading and environment variables
//! for all binary executables.

use realtime::RealtimeConfig;
use std::path::PathBuf;
use tracing::info;

/// Type of configuration to load
#[derive(Debug, Clone)]
pub enum ConfigType {
    /// Realtime connection configuration (config/realtime.yaml)
    Realtime,
    /// Custom path
    Custom(String),
}

impl ConfigType {
    /// Get the default path for this config type
    pub fn default_path(&self) -> &str {
        match self {
            ConfigType::Realtime => "config/realtime.yaml",
            ConfigType::Custom(path) => path,
        }
    }

    /// Get the environment variable name for this config type
    pub fn env_var_name(&self) -> &str {
        match self {
            ConfigType::Realtime => "REALTIME_CONFIG_PATH",
            ConfigType::Custom(_) => "CONFIG_PATH",
        }
    }
}

/// Load configuration path from environment or use default
///
/// # Examples
/// ```
/// use orderdesk::bin_common::{load_config_from_env, ConfigType};
///
/// let path = load_config_from_env(ConfigType::Realtime);
/// ```
pub fn load_config_from_env(config_type: ConfigType) -> PathBuf {
    std::env::var(config_type.env_var_name())
        .unwrap_or_else(|_| config_type.default_path().to_string())
        .into()
}

/// Load the realtime configuration for a binary
///
/// Reads `.env`, then the YAML file named by `REALTIME_CONFIG_PATH`
/// (default `config/realtime.yaml`). Without a file, defaults plus
/// `REALTIME_*` environment overrides are used.
pub fn load_realtime_config() -> anyhow::Result<RealtimeConfig> {
    dotenv::dotenv().ok();

    let path = load_config_from_env(ConfigType::Realtime);
    if path.exists() {
        Ok(RealtimeConfig::load(&path)?)
    } else {
        info!("No config file at {}, using environment", path.display());
        Ok(RealtimeConfig::from_env()?)
    }
}

/// Parse command line arguments for a binary
///
/// Returns a vector of arguments (excluding the program name)
pub fn parse_args() -> Vec<String> {
    std::env::args().skip(1).collect()
}
