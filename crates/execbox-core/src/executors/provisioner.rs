//! Image provisioning: make sure a sandbox image is present before use.
//!
//! The presence check and the pull are not atomic. Two requests racing on a
//! cold image may both pull it; the container runtime de-duplicates identical
//! pulls, so the only cost is a redundant download.

use std::sync::Arc;

use super::SandboxBackend;
use crate::errors::ExecutionError;

#[derive(Clone)]
pub struct ImageProvisioner {
    backend: Arc<dyn SandboxBackend>,
}

impl ImageProvisioner {
    pub fn new(backend: Arc<dyn SandboxBackend>) -> Self {
        Self { backend }
    }

    /// Return once `image` is available locally, pulling it if necessary.
    pub async fn ensure(&self, image: &str) -> Result<(), ExecutionError> {
        let present = self
            .backend
            .image_exists(image)
            .await
            .map_err(|source| ExecutionError::Provisioning {
                image: image.to_string(),
                source,
            })?;

        if present {
            log::debug!("Image {} already present", image);
            return Ok(());
        }

        log::info!("Pulling image {}", image);
        let started = std::time::Instant::now();
        self.backend
            .pull_image(image)
            .await
            .map_err(|source| ExecutionError::Provisioning {
                image: image.to_string(),
                source,
            })?;
        log::info!("Pulled image {} in {:?}", image, started.elapsed());
        Ok(())
    }
}
