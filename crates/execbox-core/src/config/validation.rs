//! Sanity checks for engine configuration
//!
//! Rejects limits that would either disable isolation or make every execution
//! fail before it starts.

use crate::config::types::EngineConfig;
use crate::errors::ConfigError;

/// Upper bound on the CPU quota a single sandbox may be granted.
pub const MAX_NANO_CPUS: i64 = 4_000_000_000;

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        message: message.into(),
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = &self.limits;
        if limits.memory_bytes <= 0 {
            return Err(invalid("limits.memory_bytes", "must be greater than zero"));
        }
        if limits.nano_cpus <= 0 || limits.nano_cpus > MAX_NANO_CPUS {
            return Err(invalid(
                "limits.nano_cpus",
                format!("must be between 1 and {}", MAX_NANO_CPUS),
            ));
        }
        if limits.pids_limit <= 0 {
            return Err(invalid("limits.pids_limit", "must be greater than zero"));
        }

        let execution = &self.execution;
        if execution.default_timeout_seconds == 0 {
            return Err(invalid(
                "execution.default_timeout_seconds",
                "must be greater than zero",
            ));
        }
        if execution.max_timeout_seconds < execution.default_timeout_seconds {
            return Err(invalid(
                "execution.max_timeout_seconds",
                format!(
                    "must be at least default_timeout_seconds ({})",
                    execution.default_timeout_seconds
                ),
            ));
        }
        if execution.log_tail_lines == 0 {
            return Err(invalid("execution.log_tail_lines", "must be greater than zero"));
        }
        if !execution.work_dir.starts_with('/') {
            return Err(invalid("execution.work_dir", "must be an absolute path"));
        }
        if execution.staging_prefix.contains('/') {
            return Err(invalid(
                "execution.staging_prefix",
                "must not contain path separators",
            ));
        }
        Ok(())
    }
}
