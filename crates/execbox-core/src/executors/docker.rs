// src/executors/docker.rs
use async_trait::async_trait;
use bollard::container::LogOutput; // For LogOutput::StdOut, LogOutput::StdErr
use bollard::errors::Error as BollardError;
use bollard::models::{ContainerCreateBody, HostConfig};
use bollard::query_parameters::{
    CreateContainerOptions as BollardCreateContainerOptionsQuery,
    CreateImageOptions as BollardCreateImageOptionsQuery,
    LogsOptions as BollardLogsOptionsQuery,
    RemoveContainerOptions as BollardRemoveContainerOptionsQuery,
    StartContainerOptions as BollardStartContainerOptionsQuery,
    StopContainerOptions as BollardStopContainerOptionsQuery,
    WaitContainerOptions as BollardWaitContainerOptionsQuery,
};
use bollard::Docker;
use futures_util::stream::StreamExt;
use std::collections::HashMap;
use std::time::Duration;

use super::{SandboxBackend, SandboxSpec};
use crate::errors::BackendError;

/// Label put on every sandbox so stray containers can be found and reaped.
pub const SANDBOX_LABEL: &str = "io.execbox.sandbox";

/// [`SandboxBackend`] backed by the local Docker daemon.
#[derive(Clone)]
pub struct DockerBackend {
    docker: Docker,
}

impl DockerBackend {
    pub fn connect() -> Result<Self, BackendError> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self { docker })
    }

    pub fn with_client(docker: Docker) -> Self {
        Self { docker }
    }

    fn container_config(spec: &SandboxSpec) -> ContainerCreateBody {
        let limits = &spec.limits;
        let binds = spec.staging_dir.as_ref().map(|dir| {
            vec![format!("{}:{}:ro", dir.display(), spec.work_dir)]
        });
        let network_mode = if limits.network_disabled {
            Some("none".to_string())
        } else {
            None
        };

        ContainerCreateBody {
            image: Some(spec.image.clone()),
            cmd: Some(spec.cmd.clone()),
            env: Some(spec.env.clone()),
            working_dir: Some(spec.work_dir.clone()),
            network_disabled: Some(limits.network_disabled),
            labels: Some(HashMap::from([(
                SANDBOX_LABEL.to_string(),
                spec.name.clone(),
            )])),
            host_config: Some(HostConfig {
                binds,
                memory: Some(limits.memory_bytes),
                // Same value as memory: no swap on top of the ceiling.
                memory_swap: Some(limits.memory_bytes),
                nano_cpus: Some(limits.nano_cpus),
                pids_limit: Some(limits.pids_limit),
                network_mode,
                cap_drop: Some(vec!["ALL".to_string()]),
                security_opt: Some(vec!["no-new-privileges".to_string()]),
                // Removal is explicit so logs can still be read after exit.
                auto_remove: Some(false),
                ..Default::default()
            }),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            tty: Some(false),
            ..Default::default()
        }
    }
}

#[async_trait]
impl SandboxBackend for DockerBackend {
    async fn ping(&self) -> Result<(), BackendError> {
        self.docker.ping().await?;
        Ok(())
    }

    async fn image_exists(&self, image: &str) -> Result<bool, BackendError> {
        match self.docker.inspect_image(image).await {
            Ok(_) => Ok(true),
            Err(BollardError::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn pull_image(&self, image: &str) -> Result<(), BackendError> {
        let pull_options = Some(BollardCreateImageOptionsQuery {
            from_image: Some(image.to_string()),
            ..Default::default()
        });

        // Progress messages are drained and dropped; only errors matter.
        let mut pull_stream = self.docker.create_image(pull_options, None, None);
        while let Some(progress) = pull_stream.next().await {
            let progress = progress?;
            if let Some(status) = progress.status {
                log::trace!("Pulling {}: {}", image, status);
            }
        }
        Ok(())
    }

    async fn create_sandbox(&self, spec: &SandboxSpec) -> Result<String, BackendError> {
        let options = Some(BollardCreateContainerOptionsQuery {
            name: Some(spec.name.clone()),
            ..Default::default()
        });

        let container = self
            .docker
            .create_container(options, Self::container_config(spec))
            .await?;
        for warning in &container.warnings {
            log::warn!("Docker warning for sandbox {}: {}", spec.name, warning);
        }
        Ok(container.id)
    }

    async fn start_sandbox(&self, id: &str) -> Result<(), BackendError> {
        self.docker
            .start_container(id, None::<BollardStartContainerOptionsQuery>)
            .await?;
        Ok(())
    }

    async fn wait_sandbox(&self, id: &str) -> Result<i64, BackendError> {
        // wait_container returns a stream. We need to await the next item for the result.
        let mut wait_stream = self
            .docker
            .wait_container(id, None::<BollardWaitContainerOptionsQuery>);

        match wait_stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // bollard reports a nonzero exit status as an error on the stream
            Some(Err(BollardError::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(e.into()),
            None => Err(BackendError::Other(format!(
                "wait stream for sandbox {} ended unexpectedly",
                id
            ))),
        }
    }

    async fn stop_sandbox(&self, id: &str, grace: Duration) -> Result<(), BackendError> {
        let options = BollardStopContainerOptionsQuery {
            t: Some(grace.as_secs().min(i32::MAX as u64) as i32),
            ..Default::default()
        };
        self.docker.stop_container(id, Some(options)).await?;
        Ok(())
    }

    async fn remove_sandbox(&self, id: &str) -> Result<(), BackendError> {
        let options = BollardRemoveContainerOptionsQuery {
            force: true,
            ..Default::default()
        };
        match self.docker.remove_container(id, Some(options)).await {
            Ok(()) => Ok(()),
            Err(BollardError::DockerResponseServerError {
                status_code: 404, ..
            }) => Err(BackendError::NotFound(id.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn sandbox_logs(&self, id: &str, tail: usize) -> Result<String, BackendError> {
        let mut output_stream = self.docker.logs(
            id,
            Some(BollardLogsOptionsQuery {
                stdout: true,
                stderr: true,
                tail: tail.to_string(),
                ..Default::default()
            }),
        );

        // stdout and stderr are interleaved in the order Docker recorded them
        let mut output = String::new();
        while let Some(log_result) = output_stream.next().await {
            match log_result? {
                LogOutput::StdOut { message }
                | LogOutput::StdErr { message }
                | LogOutput::Console { message } => {
                    output.push_str(&String::from_utf8_lossy(&message))
                }
                LogOutput::StdIn { .. } => {}
            }
        }
        Ok(output)
    }
}
