//! Configuration type definitions for the execution engine

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct EngineConfig {
    #[serde(default)]
    pub limits: ResourceLimits,
    #[serde(default)]
    pub execution: ExecutionSettings,
}

/// Hard ceilings applied to every sandbox.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceLimits {
    #[serde(default = "default_memory_bytes")]
    pub memory_bytes: i64,
    /// CPU quota in units of 10^-9 CPUs.
    #[serde(default = "default_nano_cpus")]
    pub nano_cpus: i64,
    #[serde(default = "default_pids_limit")]
    pub pids_limit: i64,
    #[serde(default = "default_true")]
    pub network_disabled: bool,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            memory_bytes: default_memory_bytes(),
            nano_cpus: default_nano_cpus(),
            pids_limit: default_pids_limit(),
            network_disabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionSettings {
    #[serde(default = "default_timeout_seconds")]
    pub default_timeout_seconds: u64,
    /// Ceiling for timeouts requested by callers.
    #[serde(default = "default_max_timeout_seconds")]
    pub max_timeout_seconds: u64,
    #[serde(default = "default_stop_grace_seconds")]
    pub stop_grace_seconds: u64,
    #[serde(default = "default_log_tail_lines")]
    pub log_tail_lines: usize,
    #[serde(default = "default_staging_prefix")]
    pub staging_prefix: String,
    #[serde(default = "default_work_dir")]
    pub work_dir: String,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            default_timeout_seconds: default_timeout_seconds(),
            max_timeout_seconds: default_max_timeout_seconds(),
            stop_grace_seconds: default_stop_grace_seconds(),
            log_tail_lines: default_log_tail_lines(),
            staging_prefix: default_staging_prefix(),
            work_dir: default_work_dir(),
        }
    }
}

impl ExecutionSettings {
    /// A zero or absent timeout falls back to the configured default; larger
    /// requests are capped at `max_timeout_seconds`.
    pub fn effective_timeout(&self, requested: Option<u64>) -> Duration {
        let secs = match requested {
            Some(secs) if secs > 0 => secs,
            _ => self.default_timeout_seconds,
        };
        Duration::from_secs(secs.min(self.max_timeout_seconds))
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_seconds)
    }
}

fn default_memory_bytes() -> i64 { 256 * 1024 * 1024 }
fn default_nano_cpus() -> i64 { 500_000_000 }
fn default_pids_limit() -> i64 { 50 }
fn default_true() -> bool { true }
fn default_timeout_seconds() -> u64 { 30 }
fn default_max_timeout_seconds() -> u64 { 300 }
fn default_stop_grace_seconds() -> u64 { 5 }
fn default_log_tail_lines() -> usize { 1000 }
fn default_staging_prefix() -> String { "execbox-".to_string() }
fn default_work_dir() -> String { "/app".to_string() }
