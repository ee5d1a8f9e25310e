// src/test_utils/fake_backend.rs
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::errors::BackendError;
use crate::executors::{SandboxBackend, SandboxSpec};

/// What a fake sandbox does once started.
#[derive(Debug, Clone)]
pub enum FakeBehavior {
    Exit { code: i64, output: String },
    /// Never exits on its own.
    Hang,
}

type BehaviorFn = dyn Fn(&SandboxSpec) -> FakeBehavior + Send + Sync;

#[derive(Default)]
struct FakeState {
    next_id: u64,
    images: HashSet<String>,
    pulls: Vec<String>,
    specs: HashMap<String, SandboxSpec>,
    /// Sandbox name -> staged file name -> contents, captured at creation.
    staged: HashMap<String, HashMap<String, String>>,
    live: HashSet<String>,
    events: Vec<String>,
    last_spec: Option<SandboxSpec>,
}

/// In-memory [`SandboxBackend`]. By default every sandbox exits zero and
/// prints the last element of its command, which for inline runtimes is the
/// submitted code.
pub struct FakeBackend {
    state: Mutex<FakeState>,
    behavior: Arc<BehaviorFn>,
    pull_error: Option<String>,
    create_error: Option<String>,
    start_error: Option<String>,
    wait_error: Option<String>,
    logs_error: Option<String>,
    remove_error: Option<String>,
    /// Delay before a removal takes effect.
    remove_delay: Option<Duration>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState::default()),
            behavior: Arc::new(|spec: &SandboxSpec| FakeBehavior::Exit {
                code: 0,
                output: spec.cmd.last().cloned().unwrap_or_default(),
            }),
            pull_error: None,
            create_error: None,
            start_error: None,
            wait_error: None,
            logs_error: None,
            remove_error: None,
            remove_delay: None,
        }
    }

    pub fn with_image(self, image: &str) -> Self {
        self.state.lock().unwrap().images.insert(image.to_string());
        self
    }

    pub fn with_behavior<F>(mut self, behavior: F) -> Self
    where
        F: Fn(&SandboxSpec) -> FakeBehavior + Send + Sync + 'static,
    {
        self.behavior = Arc::new(behavior);
        self
    }

    pub fn failing_pull(mut self, message: &str) -> Self {
        self.pull_error = Some(message.to_string());
        self
    }

    pub fn failing_create(mut self, message: &str) -> Self {
        self.create_error = Some(message.to_string());
        self
    }

    pub fn failing_start(mut self, message: &str) -> Self {
        self.start_error = Some(message.to_string());
        self
    }

    pub fn failing_wait(mut self, message: &str) -> Self {
        self.wait_error = Some(message.to_string());
        self
    }

    pub fn failing_logs(mut self, message: &str) -> Self {
        self.logs_error = Some(message.to_string());
        self
    }

    pub fn failing_remove(mut self, message: &str) -> Self {
        self.remove_error = Some(message.to_string());
        self
    }

    pub fn slow_remove(mut self, delay: Duration) -> Self {
        self.remove_delay = Some(delay);
        self
    }

    pub fn pulls(&self) -> Vec<String> {
        self.state.lock().unwrap().pulls.clone()
    }

    pub fn events(&self) -> Vec<String> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn last_spec(&self) -> Option<SandboxSpec> {
        self.state.lock().unwrap().last_spec.clone()
    }

    pub fn created_count(&self) -> usize {
        self.state.lock().unwrap().specs.len()
    }

    pub fn live_sandboxes(&self) -> usize {
        self.state.lock().unwrap().live.len()
    }

    pub fn staged_files(&self, sandbox_name: &str) -> HashMap<String, String> {
        self.state
            .lock()
            .unwrap()
            .staged
            .get(sandbox_name)
            .cloned()
            .unwrap_or_default()
    }

    fn record(&self, event: String) {
        self.state.lock().unwrap().events.push(event);
    }

    fn behavior_for(&self, id: &str) -> Result<FakeBehavior, BackendError> {
        let spec = self
            .state
            .lock()
            .unwrap()
            .specs
            .get(id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(id.to_string()))?;
        Ok((self.behavior)(&spec))
    }

    fn read_staged(spec: &SandboxSpec) -> HashMap<String, String> {
        let Some(dir) = &spec.staging_dir else {
            return HashMap::new();
        };
        std::fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .filter_map(|entry| {
                        let contents = std::fs::read_to_string(entry.path()).ok()?;
                        Some((entry.file_name().to_string_lossy().into_owned(), contents))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl SandboxBackend for FakeBackend {
    async fn ping(&self) -> Result<(), BackendError> {
        Ok(())
    }

    async fn image_exists(&self, image: &str) -> Result<bool, BackendError> {
        Ok(self.state.lock().unwrap().images.contains(image))
    }

    async fn pull_image(&self, image: &str) -> Result<(), BackendError> {
        if let Some(message) = &self.pull_error {
            return Err(BackendError::Other(message.clone()));
        }
        let mut state = self.state.lock().unwrap();
        state.pulls.push(image.to_string());
        state.images.insert(image.to_string());
        Ok(())
    }

    async fn create_sandbox(&self, spec: &SandboxSpec) -> Result<String, BackendError> {
        if let Some(message) = &self.create_error {
            return Err(BackendError::Other(message.clone()));
        }
        let staged = Self::read_staged(spec);
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("fake-{}", state.next_id);
        state.specs.insert(id.clone(), spec.clone());
        state.staged.insert(spec.name.clone(), staged);
        state.live.insert(id.clone());
        state.events.push(format!("create:{}", id));
        state.last_spec = Some(spec.clone());
        Ok(id)
    }

    async fn start_sandbox(&self, id: &str) -> Result<(), BackendError> {
        self.record(format!("start:{}", id));
        match &self.start_error {
            Some(message) => Err(BackendError::Other(message.clone())),
            None => Ok(()),
        }
    }

    async fn wait_sandbox(&self, id: &str) -> Result<i64, BackendError> {
        self.record(format!("wait:{}", id));
        if let Some(message) = &self.wait_error {
            return Err(BackendError::Other(message.clone()));
        }
        match self.behavior_for(id)? {
            FakeBehavior::Exit { code, .. } => {
                // Yield so concurrent executions interleave.
                tokio::task::yield_now().await;
                Ok(code)
            }
            FakeBehavior::Hang => std::future::pending::<Result<i64, BackendError>>().await,
        }
    }

    async fn stop_sandbox(&self, id: &str, _grace: Duration) -> Result<(), BackendError> {
        self.record(format!("stop:{}", id));
        Ok(())
    }

    async fn remove_sandbox(&self, id: &str) -> Result<(), BackendError> {
        if let Some(delay) = self.remove_delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock().unwrap();
        state.events.push(format!("remove:{}", id));
        if let Some(message) = &self.remove_error {
            return Err(BackendError::Other(message.clone()));
        }
        if state.live.remove(id) {
            Ok(())
        } else {
            Err(BackendError::NotFound(id.to_string()))
        }
    }

    async fn sandbox_logs(&self, id: &str, _tail: usize) -> Result<String, BackendError> {
        self.record(format!("logs:{}", id));
        if let Some(message) = &self.logs_error {
            return Err(BackendError::Other(message.clone()));
        }
        match self.behavior_for(id)? {
            FakeBehavior::Exit { output, .. } => Ok(output),
            FakeBehavior::Hang => Ok(String::new()),
        }
    }
}
