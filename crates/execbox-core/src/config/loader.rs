//! Configuration loader for YAML files and environment overrides

use crate::config::types::EngineConfig;
use crate::errors::ConfigError;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::fs;

pub const ENV_DEFAULT_TIMEOUT: &str = "EXECBOX_DEFAULT_TIMEOUT";
pub const ENV_MEMORY_BYTES: &str = "EXECBOX_MEMORY_BYTES";
pub const ENV_PIDS_LIMIT: &str = "EXECBOX_PIDS_LIMIT";

/// Configuration loader with environment resolution
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from an explicit path, else the per-user default file, else defaults.
    pub async fn load(path: Option<&Path>) -> Result<EngineConfig, ConfigError> {
        if let Some(path) = path {
            return Self::from_file(path).await;
        }

        match Self::default_path() {
            Some(default_path) if default_path.exists() => {
                log::info!("Loading configuration from {}", default_path.display());
                Self::from_file(&default_path).await
            }
            _ => {
                log::debug!("No configuration file found, using built-in defaults");
                let mut config = EngineConfig::default();
                Self::apply_env_overrides(&mut config)?;
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// `~/.config/execbox/config.yaml` on Linux, the platform equivalent elsewhere.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("execbox").join("config.yaml"))
    }

    /// Load configuration from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<EngineConfig, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.display().to_string(),
                source,
            })?;
        Self::from_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_str(content: &str) -> Result<EngineConfig, ConfigError> {
        let mut config: EngineConfig = if content.trim().is_empty() {
            EngineConfig::default()
        } else {
            serde_yaml::from_str(content)?
        };

        Self::apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(config)
    }

    fn apply_env_overrides(config: &mut EngineConfig) -> Result<(), ConfigError> {
        if let Some(timeout) = Self::env_value::<u64>(ENV_DEFAULT_TIMEOUT)? {
            config.execution.default_timeout_seconds = timeout;
        }
        if let Some(memory) = Self::env_value::<i64>(ENV_MEMORY_BYTES)? {
            config.limits.memory_bytes = memory;
        }
        if let Some(pids) = Self::env_value::<i64>(ENV_PIDS_LIMIT)? {
            config.limits.pids_limit = pids;
        }
        Ok(())
    }

    fn env_value<T>(key: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match env::var(key) {
            Ok(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
                ConfigError::Invalid {
                    key: key.to_string(),
                    message: format!("'{}' is not a valid number: {}", raw, e),
                }
            }),
            Err(_) => Ok(None),
        }
    }
}
