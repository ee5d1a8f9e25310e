use anyhow::{bail, Result};
use execbox_core::{ExecutionRequest, ExecutionResult};
use reqwest::{Client, Response};
use serde::Deserialize;

/// Error body returned by the executor service.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    kind: String,
    #[serde(default)]
    retryable: bool,
}

#[derive(Debug, Deserialize)]
struct RuntimeEntry {
    name: String,
    image: String,
}

/// HTTP client for a remote executor service.
pub struct RemoteExecutor {
    server_url: String,
    http_client: Client,
}

impl RemoteExecutor {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into().trim_end_matches('/').to_string(),
            http_client: Client::new(),
        }
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub async fn health_check(&self) -> Result<()> {
        let health_url = format!("{}/health", self.server_url);
        let response = self.http_client.get(&health_url).send().await?;

        if response.status().is_success() {
            Ok(())
        } else {
            bail!("Server health check failed: {}", response.status())
        }
    }

    pub async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult> {
        let execute_url = format!("{}/execute", self.server_url);
        log::debug!("POST {} (runtime {})", execute_url, request.runtime());

        let response = self
            .http_client
            .post(&execute_url)
            .json(request)
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    pub async fn runtimes(&self) -> Result<Vec<(String, String)>> {
        let runtimes_url = format!("{}/runtimes", self.server_url);
        let response = Self::check(self.http_client.get(&runtimes_url).send().await?).await?;
        let entries: Vec<RuntimeEntry> = response.json().await?;
        Ok(entries
            .into_iter()
            .map(|entry| (entry.name, entry.image))
            .collect())
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => bail!(
                "Server rejected the request ({} {}{}): {}",
                status.as_u16(),
                body.kind,
                if body.retryable { ", retryable" } else { "" },
                body.error
            ),
            Err(_) => bail!("Server returned {}: {}", status, text),
        }
    }
}
