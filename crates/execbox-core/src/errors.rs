//! Error types for the execution engine
//!
//! Only infrastructure failures and caller mistakes are errors here. A user
//! program that exits nonzero or runs past its deadline is a normal outcome and
//! is reported as an [`ExecutionResult`](crate::executors::ExecutionResult),
//! never as an [`ExecutionError`].

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Unsupported runtime: {0}")]
    UnsupportedRuntime(String),
    #[error("Invalid execution request: {0}")]
    InvalidRequest(String),
    #[error("Failed to provision image '{image}': {source}")]
    Provisioning {
        image: String,
        #[source]
        source: BackendError,
    },
    #[error("Failed to stage code files: {0}")]
    Staging(String),
    #[error("Failed to create sandbox: {0}")]
    SandboxCreation(String),
    #[error("Failed to start sandbox: {0}")]
    SandboxStart(String),
    #[error("Failed while waiting for sandbox: {0}")]
    SandboxWait(String),
    #[error("Failed to retrieve sandbox logs: {0}")]
    LogRetrieval(String),
    #[error("Sandbox backend unavailable: {0}")]
    Backend(String),
}

impl ExecutionError {
    /// Infra failures are worth retrying, caller mistakes are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ExecutionError::UnsupportedRuntime(_)
            | ExecutionError::InvalidRequest(_)
            | ExecutionError::Staging(_) => false,
            ExecutionError::Provisioning { .. }
            | ExecutionError::SandboxCreation(_)
            | ExecutionError::SandboxStart(_)
            | ExecutionError::SandboxWait(_)
            | ExecutionError::LogRetrieval(_)
            | ExecutionError::Backend(_) => true,
        }
    }

    /// Whether the caller, not the infrastructure, is at fault.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            ExecutionError::UnsupportedRuntime(_) | ExecutionError::InvalidRequest(_)
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ExecutionError::UnsupportedRuntime(_) => "unsupported_runtime",
            ExecutionError::InvalidRequest(_) => "invalid_request",
            ExecutionError::Provisioning { .. } => "provisioning_error",
            ExecutionError::Staging(_) => "staging_error",
            ExecutionError::SandboxCreation(_) => "sandbox_creation_error",
            ExecutionError::SandboxStart(_) => "sandbox_start_error",
            ExecutionError::SandboxWait(_) => "sandbox_wait_error",
            ExecutionError::LogRetrieval(_) => "log_retrieval_error",
            ExecutionError::Backend(_) => "backend_error",
        }
    }
}

impl From<std::io::Error> for ExecutionError {
    fn from(err: std::io::Error) -> Self {
        ExecutionError::Staging(err.to_string())
    }
}

/// Failure reported by a [`SandboxBackend`](crate::executors::SandboxBackend).
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Docker error: {0}")]
    Docker(#[from] bollard::errors::Error),
    #[error("Sandbox '{0}' not found")]
    NotFound(String),
    #[error("{0}")]
    Other(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}
