//! Tests for configuration loading and validation

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::errors::ConfigError;
    use serial_test::serial;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    #[test]
    #[serial]
    fn empty_config_uses_engine_defaults() {
        let config = ConfigLoader::from_str("").unwrap();

        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.limits.memory_bytes, 256 * 1024 * 1024);
        assert_eq!(config.limits.nano_cpus, 500_000_000);
        assert_eq!(config.limits.pids_limit, 50);
        assert!(config.limits.network_disabled);
        assert_eq!(config.execution.default_timeout_seconds, 30);
        assert_eq!(config.execution.stop_grace_seconds, 5);
        assert_eq!(config.execution.log_tail_lines, 1000);
        assert_eq!(config.execution.work_dir, "/app");
    }

    #[test]
    #[serial]
    fn partial_yaml_keeps_remaining_defaults() {
        let yaml = r#"
limits:
  memory_bytes: 134217728
execution:
  default_timeout_seconds: 10
"#;
        let config = ConfigLoader::from_str(yaml).unwrap();

        assert_eq!(config.limits.memory_bytes, 134_217_728);
        assert_eq!(config.limits.pids_limit, 50);
        assert_eq!(config.execution.default_timeout_seconds, 10);
        assert_eq!(config.execution.log_tail_lines, 1000);
    }

    #[tokio::test]
    #[serial]
    async fn loads_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "limits:\n  pids_limit: 64\n  nano_cpus: 1000000000").unwrap();

        let config = load_config(file.path()).await.unwrap();
        assert_eq!(config.limits.pids_limit, 64);
        assert_eq!(config.limits.nano_cpus, 1_000_000_000);
    }

    #[tokio::test]
    #[serial]
    async fn missing_file_is_a_read_error() {
        let result = ConfigLoader::from_file("/nonexistent/execbox.yaml").await;
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    #[serial]
    fn rejects_unsafe_limits() {
        let cases = [
            "limits:\n  memory_bytes: 0",
            "limits:\n  nano_cpus: 0",
            "limits:\n  nano_cpus: 8000000000",
            "limits:\n  pids_limit: -1",
            "execution:\n  default_timeout_seconds: 0",
            "execution:\n  max_timeout_seconds: 10",
            "execution:\n  log_tail_lines: 0",
            "execution:\n  work_dir: app",
            "execution:\n  staging_prefix: a/b",
        ];
        for yaml in cases {
            let result = ConfigLoader::from_str(yaml);
            assert!(
                matches!(result, Err(ConfigError::Invalid { .. })),
                "expected validation failure for {:?}",
                yaml
            );
        }
    }

    #[test]
    #[serial]
    fn malformed_yaml_is_a_parse_error() {
        let result = ConfigLoader::from_str("limits: [unterminated");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    #[serial]
    fn environment_overrides_file_values() {
        std::env::set_var(ENV_DEFAULT_TIMEOUT, "12");
        std::env::set_var(ENV_PIDS_LIMIT, "20");
        let config = ConfigLoader::from_str("execution:\n  default_timeout_seconds: 60");
        std::env::remove_var(ENV_DEFAULT_TIMEOUT);
        std::env::remove_var(ENV_PIDS_LIMIT);

        let config = config.unwrap();
        assert_eq!(config.execution.default_timeout_seconds, 12);
        assert_eq!(config.limits.pids_limit, 20);
    }

    #[test]
    #[serial]
    fn non_numeric_environment_override_is_rejected() {
        std::env::set_var(ENV_MEMORY_BYTES, "lots");
        let result = ConfigLoader::from_str("");
        std::env::remove_var(ENV_MEMORY_BYTES);

        assert!(matches!(result, Err(ConfigError::Invalid { key, .. }) if key == ENV_MEMORY_BYTES));
    }

    #[test]
    fn zero_or_missing_timeout_falls_back_to_default() {
        let settings = ExecutionSettings::default();
        assert_eq!(settings.effective_timeout(None), Duration::from_secs(30));
        assert_eq!(settings.effective_timeout(Some(0)), Duration::from_secs(30));
        assert_eq!(settings.effective_timeout(Some(3)), Duration::from_secs(3));
        assert_eq!(settings.stop_grace(), Duration::from_secs(5));
    }

    #[test]
    fn requested_timeouts_are_capped() {
        let settings = ExecutionSettings::default();
        assert_eq!(settings.effective_timeout(Some(300)), Duration::from_secs(300));
        assert_eq!(settings.effective_timeout(Some(301)), Duration::from_secs(300));
        assert_eq!(settings.effective_timeout(Some(u64::MAX)), Duration::from_secs(300));
    }
}
