//! Sandboxed code execution.
//!
//! A request flows through the [`registry`] (resolve the runtime profile), the
//! [`provisioner`] (make sure the image is local), the [`runner`] (create, run
//! and tear down one sandbox under a deadline) and finally the
//! [`interpreter`] (classify the captured output). The container runtime is
//! reached only through the [`SandboxBackend`] trait; [`docker`] provides the
//! production implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::ResourceLimits;
use crate::errors::{BackendError, ExecutionError};

pub mod docker;
pub mod interpreter;
pub mod provisioner;
pub mod registry;
pub mod runner;

/// Status code reported for a program that exited zero.
pub const STATUS_OK: u16 = 200;
/// Status code reported for a program that exited nonzero.
pub const STATUS_FAILED: u16 = 500;
/// Status code reported when the deadline elapsed first.
pub const STATUS_TIMEOUT: u16 = 408;
/// Exit code reserved for sandboxes killed at the deadline.
pub const EXIT_CODE_KILLED: i64 = -1;

/// One unit of work for the engine. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    code: String,
    runtime: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    input: Option<Map<String, Value>>,
    #[serde(
        default,
        rename = "timeout_sec",
        alias = "timeout_seconds",
        skip_serializing_if = "Option::is_none"
    )]
    timeout_seconds: Option<u64>,
}

impl ExecutionRequest {
    pub fn new(runtime: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            runtime: runtime.into(),
            input: None,
            timeout_seconds: None,
        }
    }

    pub fn with_input(mut self, input: Map<String, Value>) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn runtime(&self) -> &str {
        &self.runtime
    }

    /// The input payload, if one was supplied and it is not empty.
    pub fn input(&self) -> Option<&Map<String, Value>> {
        self.input.as_ref().filter(|input| !input.is_empty())
    }

    pub fn timeout_seconds(&self) -> Option<u64> {
        self.timeout_seconds
    }

    pub fn validate(&self) -> Result<(), ExecutionError> {
        if self.code.trim().is_empty() {
            return Err(ExecutionError::InvalidRequest(
                "code must not be empty".to_string(),
            ));
        }
        if self.runtime.trim().is_empty() {
            return Err(ExecutionError::InvalidRequest(
                "runtime must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of running user code. Timeouts and nonzero exits live here, not in
/// [`ExecutionError`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    #[serde(default)]
    pub output: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    pub status_code: u16,
    #[serde(default)]
    pub duration_ms: u64,
    pub exit_code: i64,
    #[serde(
        default,
        rename = "result",
        skip_serializing_if = "Option::is_none"
    )]
    pub structured_result: Option<Map<String, Value>>,
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        self.exit_code == 0 && self.status_code == STATUS_OK
    }

    pub fn is_timeout(&self) -> bool {
        self.status_code == STATUS_TIMEOUT
    }
}

/// Backend-neutral description of a sandbox to create.
#[derive(Debug, Clone, PartialEq)]
pub struct SandboxSpec {
    pub name: String,
    pub image: String,
    pub cmd: Vec<String>,
    pub env: Vec<String>,
    pub work_dir: String,
    /// Host directory mounted read-only at `work_dir`.
    pub staging_dir: Option<PathBuf>,
    pub limits: ResourceLimits,
}

/// Control surface of the container runtime the engine depends on.
#[async_trait]
pub trait SandboxBackend: Send + Sync {
    async fn ping(&self) -> Result<(), BackendError>;

    async fn image_exists(&self, image: &str) -> Result<bool, BackendError>;

    /// Pull an image, blocking until the pull finishes.
    async fn pull_image(&self, image: &str) -> Result<(), BackendError>;

    /// Allocate a sandbox and return its identity.
    async fn create_sandbox(&self, spec: &SandboxSpec) -> Result<String, BackendError>;

    async fn start_sandbox(&self, id: &str) -> Result<(), BackendError>;

    /// Wait until the sandbox stops running and return its exit code.
    async fn wait_sandbox(&self, id: &str) -> Result<i64, BackendError>;

    /// Stop with a grace period before a hard kill.
    async fn stop_sandbox(&self, id: &str, grace: Duration) -> Result<(), BackendError>;

    /// Force-remove the sandbox, running or not.
    async fn remove_sandbox(&self, id: &str) -> Result<(), BackendError>;

    /// Combined stdout and stderr, limited to the last `tail` lines.
    async fn sandbox_logs(&self, id: &str, tail: usize) -> Result<String, BackendError>;
}

#[async_trait]
pub trait CodeExecutor: Send + Sync {
    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionResult, ExecutionError>;

    /// Names of the runtimes this executor accepts, with their images.
    fn runtimes(&self) -> Vec<(String, String)>;
}
