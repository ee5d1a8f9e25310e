//! HTTP front end for the execution engine.
//!
//! Exposes `/health`, `/runtimes` and `POST /execute`. Any outcome of the
//! user's program, including a nonzero exit or a timeout, is a `200` carrying
//! the execution result; only rejected requests and infrastructure failures
//! surface as error statuses.

pub mod error;

pub use error::{Result, ServerError};

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::response::Json;
use axum::routing::{get, post};
use axum::{middleware, Router};
use execbox_core::{CodeExecutor, ExecutionRequest, ExecutionResult};
use serde::Serialize;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Port the executor listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 8081;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuntimeInfo {
    pub name: String,
    pub image: String,
}

/// Configuration for the executor service.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Enable CORS
    pub enable_cors: bool,
    /// CORS allowed origins (if None, allows any origin)
    pub cors_origins: Option<Vec<String>>,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
    /// Enable request logging
    pub enable_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            enable_cors: true,
            cors_origins: None,
            max_body_size: 1024 * 1024, // 1MB
            enable_logging: true,
        }
    }
}

impl ServerConfig {
    /// Create a new server configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bind address.
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Parse and set the bind address from a string.
    pub fn with_bind_addr_str(mut self, addr: &str) -> Result<Self> {
        self.bind_addr = addr
            .parse()
            .map_err(|e| ServerError::config_error(format!("Invalid bind address: {}", e)))?;
        Ok(self)
    }

    /// Enable or disable CORS.
    pub fn with_cors(mut self, enable: bool) -> Self {
        self.enable_cors = enable;
        self
    }

    /// Set allowed CORS origins.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Set maximum request body size.
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    /// Enable or disable request logging.
    pub fn with_logging(mut self, enable: bool) -> Self {
        self.enable_logging = enable;
        self
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub executor: Arc<dyn CodeExecutor>,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "executor".to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn runtimes_handler(State(app_state): State<AppState>) -> Json<Vec<RuntimeInfo>> {
    let runtimes = app_state
        .executor
        .runtimes()
        .into_iter()
        .map(|(name, image)| RuntimeInfo { name, image })
        .collect();
    Json(runtimes)
}

/// Handler for the /execute POST endpoint.
async fn execute_handler(
    State(app_state): State<AppState>,
    payload: std::result::Result<Json<ExecutionRequest>, JsonRejection>,
) -> Result<Json<ExecutionResult>> {
    let Json(request) = payload.map_err(|e| ServerError::invalid_request(e.body_text()))?;
    log::debug!(
        "Execute request: runtime {}, {} bytes of code",
        request.runtime(),
        request.code().len()
    );

    let result = app_state.executor.execute(request).await?;
    Ok(Json(result))
}

/// The executor service.
pub struct ExecutorServer {
    executor: Arc<dyn CodeExecutor>,
    config: ServerConfig,
}

impl ExecutorServer {
    /// Create a new server with the given executor and default configuration.
    pub fn new(executor: Arc<dyn CodeExecutor>) -> Self {
        Self {
            executor,
            config: ServerConfig::default(),
        }
    }

    /// Create a new server with custom configuration.
    pub fn with_config(executor: Arc<dyn CodeExecutor>, config: ServerConfig) -> Self {
        Self { executor, config }
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the Axum router with all routes and middleware.
    pub fn build_router(&self) -> Router {
        let state = AppState {
            executor: self.executor.clone(),
        };

        let mut router = Router::new()
            .route("/health", get(health_handler))
            .route("/runtimes", get(runtimes_handler))
            .route("/execute", post(execute_handler))
            .layer(DefaultBodyLimit::max(self.config.max_body_size))
            .with_state(state);

        if self.config.enable_logging {
            router =
                router.layer(middleware::from_fn(
                    |request: axum::http::Request<axum::body::Body>,
                     next: axum::middleware::Next| async {
                        let request_id = uuid::Uuid::new_v4().to_string();
                        let method = request.method().clone();
                        let uri = request.uri().clone();

                        // Health probes arrive every few seconds
                        if uri.path() == "/health" {
                            log::debug!("Request {} {} {}", request_id, method, uri);
                        } else {
                            log::info!("Request {} {} {}", request_id, method, uri);
                        }

                        let start = std::time::Instant::now();
                        let response = next.run(request).await;
                        let duration = start.elapsed();

                        if uri.path() == "/health" {
                            log::debug!("Response {} completed in {:?}", request_id, duration);
                        } else {
                            log::info!(
                                "Response {} {} completed in {:?}",
                                request_id,
                                response.status(),
                                duration
                            );
                        }

                        response
                    },
                ));
        }

        router = router.layer(TraceLayer::new_for_http());

        if self.config.enable_cors {
            let cors_layer = if let Some(ref origins) = self.config.cors_origins {
                let origins: std::result::Result<Vec<_>, _> =
                    origins.iter().map(|s| s.parse()).collect();
                match origins {
                    Ok(origins) => CorsLayer::new()
                        .allow_origin(origins)
                        .allow_methods(Any)
                        .allow_headers(Any),
                    Err(_) => {
                        log::warn!("Invalid CORS origin configured, falling back to permissive");
                        CorsLayer::permissive()
                    }
                }
            } else {
                CorsLayer::permissive()
            };
            router = router.layer(cors_layer);
        }

        router
    }

    /// Start the server and listen for connections until the process exits.
    pub async fn serve(self) -> Result<()> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Start the server with graceful shutdown support.
    ///
    /// In-flight executions finish (and clean up their sandboxes) before the
    /// server returns.
    pub async fn serve_with_shutdown<F>(self, shutdown_signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let router = self.build_router();
        let listener = TcpListener::bind(self.config.bind_addr)
            .await
            .map_err(|e| {
                ServerError::config_error(format!(
                    "Failed to bind to {}: {}",
                    self.config.bind_addr, e
                ))
            })?;

        log::info!("Executor service starting on {}", self.config.bind_addr);
        log::info!("Health check: http://{}/health", self.config.bind_addr);
        log::info!("Execute endpoint: http://{}/execute", self.config.bind_addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ServerError::internal(format!("Server error: {}", e)))?;

        log::info!("Executor service shut down gracefully");
        Ok(())
    }
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log::info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            log::info!("Received SIGTERM, shutting down...");
        },
    }
}
