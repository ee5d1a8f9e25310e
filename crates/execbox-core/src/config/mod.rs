//! Configuration module for the execution engine
//!
//! Resource ceilings and execution defaults are read once at startup from an
//! optional YAML file, then frozen. Every value has a default, so an empty or
//! missing file yields the stock engine limits.

pub mod loader;
pub mod types;
pub mod validation;

pub use loader::*;
pub use types::*;

#[cfg(test)]
mod tests;

use crate::errors::ConfigError;
use std::path::Path;

/// Load a configuration from a YAML file
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<EngineConfig, ConfigError> {
    ConfigLoader::from_file(path).await
}
