use anyhow::{bail, Context, Result};
use execbox_core::executors::EXIT_CODE_KILLED;
use execbox_core::{ExecutionRequest, ExecutionResult, RuntimeRegistry};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Process status used when the sandbox was killed at its deadline, as `timeout(1)` does.
pub const TIMEOUT_EXIT_STATUS: i32 = 124;

/// A program read from disk, ready to be submitted.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub runtime: String,
    pub code: String,
}

impl SourceFile {
    /// Read `path`, taking the runtime from `runtime` or else from the file extension.
    pub async fn load(
        path: impl AsRef<Path>,
        runtime: Option<&str>,
        registry: &RuntimeRegistry,
    ) -> Result<Self> {
        let path = path.as_ref();
        let runtime = match runtime {
            Some(name) => registry.resolve(name)?.name.to_string(),
            None => infer_runtime(path, registry)?,
        };
        let code = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            runtime,
            code,
        })
    }

    pub fn into_request(
        self,
        input: Option<Map<String, Value>>,
        timeout_seconds: Option<u64>,
    ) -> ExecutionRequest {
        let mut request = ExecutionRequest::new(self.runtime, self.code);
        if let Some(input) = input {
            request = request.with_input(input);
        }
        if let Some(seconds) = timeout_seconds {
            request = request.with_timeout_seconds(seconds);
        }
        request
    }
}

pub fn infer_runtime(path: &Path, registry: &RuntimeRegistry) -> Result<String> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .with_context(|| {
            format!(
                "Cannot infer a runtime for {} without an extension; pass --runtime",
                path.display()
            )
        })?;

    match registry.resolve_extension(extension) {
        Some(profile) => Ok(profile.name.to_string()),
        None => bail!(
            "No runtime handles .{} files (known runtimes: {}); pass --runtime",
            extension,
            registry.names().join(", ")
        ),
    }
}

/// Parse the `--input` argument, which must be a JSON object.
pub fn parse_input(raw: &str) -> Result<Map<String, Value>> {
    let value: Value = serde_json::from_str(raw).context("--input is not valid JSON")?;
    match value {
        Value::Object(map) => Ok(map),
        other => bail!("--input must be a JSON object, got {}", kind_of(&other)),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Map a sandbox outcome onto a process exit status.
pub fn exit_status(result: &ExecutionResult) -> i32 {
    if result.is_timeout() || result.exit_code == EXIT_CODE_KILLED {
        return TIMEOUT_EXIT_STATUS;
    }
    match result.exit_code {
        0 => 0,
        code => match (code & 0xff) as i32 {
            // Codes that wrap to zero must not look like success.
            0 => 1,
            status => status,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn result(exit_code: i64, status_code: u16) -> ExecutionResult {
        ExecutionResult {
            output: String::new(),
            error: String::new(),
            status_code,
            duration_ms: 0,
            exit_code,
            structured_result: None,
        }
    }

    #[test]
    fn runtime_follows_the_extension() {
        let registry = RuntimeRegistry::builtin();
        let cases = [
            ("job.py", "python"),
            ("scripts/index.js", "nodejs"),
            ("main.go", "go"),
            ("UPPER.PY", "python"),
        ];
        for (path, runtime) in cases {
            assert_eq!(infer_runtime(Path::new(path), &registry).unwrap(), runtime);
        }
    }

    #[test]
    fn unknown_extensions_ask_for_a_runtime() {
        let registry = RuntimeRegistry::builtin();
        let err = infer_runtime(Path::new("app.rb"), &registry).unwrap_err();
        assert!(err.to_string().contains("--runtime"));
        assert!(infer_runtime(Path::new("Makefile"), &registry).is_err());
    }

    #[test]
    fn input_must_be_an_object() {
        assert_eq!(parse_input(r#"{"n": 3}"#).unwrap()["n"], Value::from(3));
        assert!(parse_input("[1, 2]")
            .unwrap_err()
            .to_string()
            .contains("an array"));
        assert!(parse_input("{not json").is_err());
    }

    #[test]
    fn exit_status_mapping() {
        assert_eq!(exit_status(&result(0, 200)), 0);
        assert_eq!(exit_status(&result(1, 500)), 1);
        assert_eq!(exit_status(&result(137, 500)), 137);
        assert_eq!(exit_status(&result(256, 500)), 1);
        assert_eq!(exit_status(&result(-1, 408)), TIMEOUT_EXIT_STATUS);
    }

    #[tokio::test]
    async fn loads_source_and_builds_a_request() {
        let mut file = tempfile::Builder::new().suffix(".py").tempfile().unwrap();
        write!(file, "print('hi')").unwrap();

        let registry = RuntimeRegistry::builtin();
        let source = SourceFile::load(file.path(), None, &registry).await.unwrap();
        assert_eq!(source.runtime, "python");

        let request = source.into_request(Some(parse_input(r#"{"a": 1}"#).unwrap()), Some(4));
        assert_eq!(request.code(), "print('hi')");
        assert_eq!(request.timeout_seconds(), Some(4));
        assert!(request.input().is_some());
    }

    #[tokio::test]
    async fn explicit_runtime_overrides_the_extension() {
        let file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        let registry = RuntimeRegistry::builtin();

        let source = SourceFile::load(file.path(), Some("NodeJS"), &registry)
            .await
            .unwrap();
        assert_eq!(source.runtime, "nodejs");
        assert!(SourceFile::load(file.path(), Some("ruby"), &registry)
            .await
            .is_err());
    }
}
