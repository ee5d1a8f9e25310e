//! Sandboxed execution of untrusted code.
//!
//! Given source text, a runtime identifier and an optional JSON input, the
//! engine provisions a fresh, network-isolated, resource-capped container, runs
//! the code to completion or timeout, tears the container down and returns a
//! structured result.
//!
//! # Architecture Overview
//!
//! - **Runtime registry**: immutable table from runtime name to sandbox profile
//! - **Image provisioner**: pulls sandbox images on first use
//! - **Sandbox runner**: staging, isolation limits, deadline, guaranteed teardown
//! - **Output interpreter**: status classification and best-effort JSON parsing
//! - **Backend**: the container runtime seam, with a Docker implementation
//! - **Configuration system**: YAML resource ceilings with environment overrides

pub mod config;
pub mod engine;
pub mod errors;
pub mod executors;

pub use config::{ConfigLoader, EngineConfig};
pub use engine::ExecutionEngine;
pub use errors::{BackendError, ConfigError, ExecutionError};
pub use executors::docker::DockerBackend;
pub use executors::registry::{RuntimeProfile, RuntimeRegistry};
pub use executors::{CodeExecutor, ExecutionRequest, ExecutionResult, SandboxBackend};

#[cfg(test)]
pub mod test_utils;
