//! Sandbox runner: one ephemeral, resource-capped sandbox per request.
//!
//! Lifecycle of a sandbox: created, running, then exited or killed at the
//! deadline, then removed. Removal is tied to [`SandboxGuard`], so it happens
//! on every path out of [`SandboxRunner::run`] once an identity exists,
//! including when the caller drops the future mid-flight.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tempfile::{Builder, TempDir};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;
use uuid::Uuid;

use super::interpreter::{interpret, timeout_result};
use super::registry::RuntimeProfile;
use super::{ExecutionRequest, ExecutionResult, SandboxBackend, SandboxSpec};
use crate::config::{EngineConfig, ExecutionSettings, ResourceLimits};
use crate::errors::ExecutionError;

pub const INPUT_FILE_NAME: &str = "input.json";
pub const INPUT_PATH_ENV: &str = "EXECBOX_INPUT_PATH";

/// Extra time allowed for the stop call beyond the grace period.
const STOP_SLACK: Duration = Duration::from_secs(5);

/// Owns an allocated sandbox identity and removes the sandbox when released
/// or dropped.
pub struct SandboxGuard {
    backend: Arc<dyn SandboxBackend>,
    id: Option<String>,
}

impl SandboxGuard {
    pub fn new(backend: Arc<dyn SandboxBackend>, id: String) -> Self {
        Self {
            backend,
            id: Some(id),
        }
    }

    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }

    /// Remove the sandbox now. Failures are logged, never returned.
    ///
    /// The id stays owned until removal returns, so dropping this future
    /// part-way hands the removal to `Drop`.
    pub async fn release(mut self) {
        if let Some(id) = self.id.clone() {
            remove_sandbox_logged(self.backend.as_ref(), &id).await;
            self.id = None;
        }
    }
}

impl Drop for SandboxGuard {
    fn drop(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        let backend = self.backend.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                log::debug!("Sandbox {} dropped without release, removing in background", id);
                handle.spawn(async move {
                    remove_sandbox_logged(backend.as_ref(), &id).await;
                });
            }
            Err(_) => {
                log::error!("Sandbox {} leaked: no async runtime available to remove it", id);
            }
        }
    }
}

async fn remove_sandbox_logged(backend: &dyn SandboxBackend, id: &str) {
    match backend.remove_sandbox(id).await {
        Ok(()) => log::debug!("Removed sandbox {}", id),
        Err(e) => log::warn!("Failed to remove sandbox {}: {}", id, e),
    }
}

/// Files and command prepared for one sandbox.
struct StagedInvocation {
    /// Removed from the host when dropped.
    dir: TempDir,
    cmd: Vec<String>,
    env: Vec<String>,
}

pub struct SandboxRunner {
    backend: Arc<dyn SandboxBackend>,
    limits: ResourceLimits,
    settings: ExecutionSettings,
}

impl SandboxRunner {
    pub fn new(backend: Arc<dyn SandboxBackend>, config: &EngineConfig) -> Self {
        Self {
            backend,
            limits: config.limits.clone(),
            settings: config.execution.clone(),
        }
    }

    /// Run `request` to completion or its deadline.
    ///
    /// Misbehaving user code (nonzero exit, timeout) comes back as `Ok`; only
    /// infrastructure failures are `Err`.
    pub async fn run(
        &self,
        profile: &RuntimeProfile,
        request: &ExecutionRequest,
    ) -> Result<ExecutionResult, ExecutionError> {
        let timeout = self.settings.effective_timeout(request.timeout_seconds());
        let deadline = Instant::now().checked_add(timeout).ok_or_else(|| {
            ExecutionError::InvalidRequest(format!("timeout of {:?} is out of range", timeout))
        })?;

        let staged = self.stage(profile, request).await?;
        let spec = SandboxSpec {
            name: format!("execbox-{}", Uuid::new_v4()),
            image: profile.image.to_string(),
            cmd: staged.cmd.clone(),
            env: staged.env.clone(),
            work_dir: self.settings.work_dir.clone(),
            staging_dir: Some(staged.dir.path().to_path_buf()),
            limits: self.limits.clone(),
        };

        let id = self
            .backend
            .create_sandbox(&spec)
            .await
            .map_err(|e| ExecutionError::SandboxCreation(e.to_string()))?;
        log::debug!("Created sandbox {} ({}) for runtime {}", spec.name, id, profile.name);

        let guard = SandboxGuard::new(self.backend.clone(), id);
        let outcome = self.drive(guard.id(), deadline, timeout).await;
        guard.release().await;
        drop(staged);

        outcome
    }

    async fn drive(
        &self,
        id: &str,
        deadline: Instant,
        timeout: Duration,
    ) -> Result<ExecutionResult, ExecutionError> {
        match tokio::time::timeout_at(deadline, self.start_and_wait(id)).await {
            Err(_elapsed) => {
                log::warn!("Execution timed out after {:?} for sandbox {}", timeout, id);
                self.stop_after_timeout(id).await;
                Ok(timeout_result())
            }
            Ok(Err(e)) => Err(e),
            Ok(Ok(exit_code)) => {
                let output = self
                    .backend
                    .sandbox_logs(id, self.settings.log_tail_lines)
                    .await
                    .map_err(|e| ExecutionError::LogRetrieval(e.to_string()))?;
                Ok(interpret(output, exit_code))
            }
        }
    }

    async fn start_and_wait(&self, id: &str) -> Result<i64, ExecutionError> {
        self.backend
            .start_sandbox(id)
            .await
            .map_err(|e| ExecutionError::SandboxStart(e.to_string()))?;
        self.backend
            .wait_sandbox(id)
            .await
            .map_err(|e| ExecutionError::SandboxWait(e.to_string()))
    }

    async fn stop_after_timeout(&self, id: &str) {
        let grace = self.settings.stop_grace();
        let stop = self.backend.stop_sandbox(id, grace);
        match tokio::time::timeout(grace + STOP_SLACK, stop).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::warn!("Failed to stop sandbox {}: {}", id, e),
            Err(_) => log::warn!("Stopping sandbox {} did not finish in time", id),
        }
    }

    /// Write the request into a fresh staging directory and build the command.
    async fn stage(
        &self,
        profile: &RuntimeProfile,
        request: &ExecutionRequest,
    ) -> Result<StagedInvocation, ExecutionError> {
        let dir = Builder::new()
            .prefix(&self.settings.staging_prefix)
            .tempdir()?;
        make_world_readable(dir.path(), 0o755).await?;

        let mut env: Vec<String> = profile.env.iter().map(|var| var.to_string()).collect();

        let cmd = match profile.inline_command(request.code()) {
            Some(cmd) => cmd,
            None => {
                write_staged_file(dir.path(), &profile.source_file_name(), request.code().as_bytes())
                    .await?;
                profile.file_command(&self.settings.work_dir)
            }
        };

        if let Some(input) = request.input() {
            write_staged_file(dir.path(), INPUT_FILE_NAME, &serialize_input(input)?).await?;
            env.push(format!(
                "{}={}/{}",
                INPUT_PATH_ENV, self.settings.work_dir, INPUT_FILE_NAME
            ));
        }

        Ok(StagedInvocation { dir, cmd, env })
    }
}

fn serialize_input(input: &Map<String, Value>) -> Result<Vec<u8>, ExecutionError> {
    serde_json::to_vec(input)
        .map_err(|e| ExecutionError::Staging(format!("Failed to serialize input: {}", e)))
}

async fn write_staged_file(dir: &Path, name: &str, contents: &[u8]) -> Result<(), ExecutionError> {
    let path = dir.join(name);
    let mut file = fs::File::create(&path).await?;
    file.write_all(contents).await?;
    file.flush().await?; // Ensure data is written
    make_world_readable(&path, 0o644).await?;
    Ok(())
}

/// The sandbox user shares no uid with the host, so staged files need
/// read permission for others.
async fn make_world_readable(path: &Path, mode: u32) -> Result<(), ExecutionError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?;
    }
    #[cfg(not(unix))]
    let _ = (path, mode);
    Ok(())
}
