//! The execution engine: the single entry point the service layer talks to.
//!
//! Each call to [`ExecutionEngine::execute`] is independent. The runtime table
//! is immutable and the image cache is only ever added to, so concurrent calls
//! share nothing mutable.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::errors::{ExecutionError, BackendError};
use crate::executors::docker::DockerBackend;
use crate::executors::provisioner::ImageProvisioner;
use crate::executors::registry::RuntimeRegistry;
use crate::executors::runner::SandboxRunner;
use crate::executors::{CodeExecutor, ExecutionRequest, ExecutionResult, SandboxBackend};

pub struct ExecutionEngine {
    registry: RuntimeRegistry,
    provisioner: ImageProvisioner,
    runner: SandboxRunner,
    backend: Arc<dyn SandboxBackend>,
}

impl ExecutionEngine {
    pub fn new(backend: Arc<dyn SandboxBackend>, config: EngineConfig) -> Self {
        Self {
            registry: RuntimeRegistry::builtin(),
            provisioner: ImageProvisioner::new(backend.clone()),
            runner: SandboxRunner::new(backend.clone(), &config),
            backend,
        }
    }

    /// Engine backed by the local Docker daemon.
    pub fn connect_docker(config: EngineConfig) -> Result<Self, ExecutionError> {
        let backend = DockerBackend::connect().map_err(backend_unavailable)?;
        Ok(Self::new(Arc::new(backend), config))
    }

    pub fn registry(&self) -> &RuntimeRegistry {
        &self.registry
    }

    /// Check that the sandbox backend is reachable.
    pub async fn health_check(&self) -> Result<(), ExecutionError> {
        self.backend.ping().await.map_err(backend_unavailable)
    }

    /// Pull the images of the named runtimes, or of every runtime if none are named.
    pub async fn prepare(&self, runtimes: &[String]) -> Result<Vec<String>, ExecutionError> {
        let profiles = if runtimes.is_empty() {
            self.registry.profiles()
        } else {
            runtimes
                .iter()
                .map(|name| self.registry.resolve(name))
                .collect::<Result<Vec<_>, _>>()?
        };

        let mut images = Vec::with_capacity(profiles.len());
        for profile in profiles {
            self.provisioner.ensure(profile.image).await?;
            images.push(profile.image.to_string());
        }
        Ok(images)
    }

    /// Run one request end to end.
    ///
    /// `Err` only for caller mistakes and infrastructure failures; a program
    /// that fails or times out is reported inside the `Ok` result.
    pub async fn execute(
        &self,
        request: ExecutionRequest,
    ) -> Result<ExecutionResult, ExecutionError> {
        let accepted = Instant::now();
        let execution_id = Uuid::new_v4();
        log::info!(
            "Execution {} accepted (runtime: {}, timeout: {:?})",
            execution_id,
            request.runtime(),
            request.timeout_seconds()
        );

        let outcome = self.execute_inner(&request).await;
        let duration_ms = accepted.elapsed().as_millis() as u64;

        match outcome {
            Ok(mut result) => {
                result.duration_ms = duration_ms;
                log::info!(
                    "Execution {} finished: status {}, exit code {}, {} ms",
                    execution_id,
                    result.status_code,
                    result.exit_code,
                    duration_ms
                );
                Ok(result)
            }
            Err(e) => {
                if e.is_caller_error() {
                    log::info!("Execution {} rejected: {}", execution_id, e);
                } else {
                    log::error!("Execution {} failed after {} ms: {}", execution_id, duration_ms, e);
                }
                Err(e)
            }
        }
    }

    async fn execute_inner(
        &self,
        request: &ExecutionRequest,
    ) -> Result<ExecutionResult, ExecutionError> {
        request.validate()?;
        let profile = self.registry.resolve(request.runtime())?;
        self.provisioner.ensure(profile.image).await?;
        self.runner.run(profile, request).await
    }
}

fn backend_unavailable(err: BackendError) -> ExecutionError {
    ExecutionError::Backend(err.to_string())
}

#[async_trait]
impl CodeExecutor for ExecutionEngine {
    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionResult, ExecutionError> {
        ExecutionEngine::execute(self, request).await
    }

    fn runtimes(&self) -> Vec<(String, String)> {
        self.registry
            .profiles()
            .into_iter()
            .map(|profile| (profile.name.to_string(), profile.image.to_string()))
            .collect()
    }
}
