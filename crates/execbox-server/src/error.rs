//! Error types for the executor service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use execbox_core::ExecutionError;
use serde_json::json;
use thiserror::Error;

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Errors that can occur in the executor service.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The engine refused or failed the request
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// Invalid request format
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Server configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Create a new invalid request error.
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a new configuration error.
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Convert ServerError to HTTP status code
impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Execution(e) => match e {
                ExecutionError::UnsupportedRuntime(_) | ExecutionError::InvalidRequest(_) => {
                    StatusCode::BAD_REQUEST
                }
                ExecutionError::Provisioning { .. } | ExecutionError::Backend(_) => {
                    StatusCode::BAD_GATEWAY
                }
                ExecutionError::Staging(_)
                | ExecutionError::SandboxCreation(_)
                | ExecutionError::SandboxStart(_)
                | ExecutionError::SandboxWait(_)
                | ExecutionError::LogRetrieval(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Io(_) | ServerError::Config(_) | ServerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            ServerError::Execution(e) => e.kind(),
            ServerError::InvalidRequest(_) => "invalid_request",
            ServerError::Io(_) => "io_error",
            ServerError::Config(_) => "config_error",
            ServerError::Internal(_) => "internal_error",
        }
    }

    pub fn retryable(&self) -> bool {
        match self {
            ServerError::Execution(e) => e.is_retryable(),
            ServerError::InvalidRequest(_) | ServerError::Config(_) => false,
            ServerError::Io(_) | ServerError::Internal(_) => true,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("Request failed ({}): {}", self.error_type(), self);
        } else {
            log::info!("Request rejected ({}): {}", self.error_type(), self);
        }

        let body = json!({
            "error": self.to_string(),
            "kind": self.error_type(),
            "retryable": self.retryable(),
            "timestamp": chrono::Utc::now(),
        });
        (status, Json(body)).into_response()
    }
}
