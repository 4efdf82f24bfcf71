// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake container runtime for testing

use super::{ContainerRuntime, ContainerSpec, RuntimeError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Recorded runtime call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCall {
    ImagePresent { image: String },
    PullImage { image: String },
    Create { image: String, env: Vec<String>, binds: Vec<String> },
    Start { id: String },
    Wait { id: String },
    Kill { id: String, signal: String },
    Remove { id: String },
    Logs { id: String, stdout: bool, stderr: bool },
    ReadFile { id: String, path: String },
}

struct FakeRuntimeState {
    calls: Vec<RuntimeCall>,
    present_images: Vec<String>,
    pull_error: Option<String>,
    create_error: Option<String>,
    exit_code: i64,
    /// How long `wait` blocks before returning
    wait_delay: Duration,
    stdout_bytes: Vec<u8>,
    stderr_bytes: Vec<u8>,
    files: HashMap<String, Vec<u8>>,
    next_id: u64,
}

/// Scriptable in-memory container runtime.
///
/// Defaults to a present image that exits 0 with empty output; tests
/// override the pieces they care about.
#[derive(Clone)]
pub struct FakeRuntime {
    inner: Arc<Mutex<FakeRuntimeState>>,
}

impl Default for FakeRuntime {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeRuntimeState {
                calls: Vec::new(),
                present_images: Vec::new(),
                pull_error: None,
                create_error: None,
                exit_code: 0,
                wait_delay: Duration::ZERO,
                stdout_bytes: Vec::new(),
                stderr_bytes: Vec::new(),
                files: HashMap::new(),
                next_id: 0,
            })),
        }
    }
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.inner.lock().calls.clone()
    }

    /// Mark an image as already present locally
    pub fn add_image(&self, image: &str) {
        self.inner.lock().present_images.push(image.to_string());
    }

    /// Script the next pull to fail
    pub fn fail_pulls(&self, message: &str) {
        self.inner.lock().pull_error = Some(message.to_string());
    }

    /// Script container creation to fail
    pub fn fail_creates(&self, message: &str) {
        self.inner.lock().create_error = Some(message.to_string());
    }

    /// Script the container exit code
    pub fn set_exit_code(&self, code: i64) {
        self.inner.lock().exit_code = code;
    }

    /// Script how long containers take to exit
    pub fn set_wait_delay(&self, delay: Duration) {
        self.inner.lock().wait_delay = delay;
    }

    /// Script the container's stdout stream
    pub fn set_stdout(&self, bytes: &[u8]) {
        self.inner.lock().stdout_bytes = bytes.to_vec();
    }

    /// Script the container's stderr stream
    pub fn set_stderr(&self, bytes: &[u8]) {
        self.inner.lock().stderr_bytes = bytes.to_vec();
    }

    /// Script a file in the container filesystem
    pub fn add_file(&self, path: &str, contents: &[u8]) {
        self.inner.lock().files.insert(path.to_string(), contents.to_vec());
    }

    /// Whether any container was removed
    pub fn removed_ids(&self) -> Vec<String> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                RuntimeCall::Remove { id } => Some(id.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn image_present(&self, image: &str) -> Result<bool, RuntimeError> {
        let mut state = self.inner.lock();
        state.calls.push(RuntimeCall::ImagePresent {
            image: image.to_string(),
        });
        Ok(state.present_images.iter().any(|i| i == image))
    }

    async fn pull_image(&self, image: &str, _timeout: Duration) -> Result<(), RuntimeError> {
        let mut state = self.inner.lock();
        state.calls.push(RuntimeCall::PullImage {
            image: image.to_string(),
        });
        if let Some(message) = &state.pull_error {
            return Err(RuntimeError::PullFailed {
                image: image.to_string(),
                message: message.clone(),
            });
        }
        let image = image.to_string();
        state.present_images.push(image);
        Ok(())
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        let mut state = self.inner.lock();
        state.calls.push(RuntimeCall::Create {
            image: spec.image.clone(),
            env: spec.env.clone(),
            binds: spec.binds.clone(),
        });
        if let Some(message) = &state.create_error {
            return Err(RuntimeError::CreateFailed(message.clone()));
        }
        state.next_id += 1;
        Ok(format!("fake-{}", state.next_id))
    }

    async fn start(&self, id: &str) -> Result<(), RuntimeError> {
        self.inner
            .lock()
            .calls
            .push(RuntimeCall::Start { id: id.to_string() });
        Ok(())
    }

    async fn wait(&self, id: &str) -> Result<i64, RuntimeError> {
        let (delay, code) = {
            let mut state = self.inner.lock();
            state.calls.push(RuntimeCall::Wait { id: id.to_string() });
            (state.wait_delay, state.exit_code)
        };
        if delay > Duration::ZERO {
            tokio::time::sleep(delay).await;
        }
        Ok(code)
    }

    async fn kill(&self, id: &str, signal: &str) -> Result<(), RuntimeError> {
        self.inner.lock().calls.push(RuntimeCall::Kill {
            id: id.to_string(),
            signal: signal.to_string(),
        });
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), RuntimeError> {
        self.inner
            .lock()
            .calls
            .push(RuntimeCall::Remove { id: id.to_string() });
        Ok(())
    }

    async fn logs(&self, id: &str, stdout: bool, stderr: bool) -> Result<Vec<u8>, RuntimeError> {
        let mut state = self.inner.lock();
        state.calls.push(RuntimeCall::Logs {
            id: id.to_string(),
            stdout,
            stderr,
        });
        let mut bytes = Vec::new();
        if stdout {
            bytes.extend_from_slice(&state.stdout_bytes);
        }
        if stderr {
            bytes.extend_from_slice(&state.stderr_bytes);
        }
        Ok(bytes)
    }

    async fn read_file(&self, id: &str, path: &str) -> Result<Vec<u8>, RuntimeError> {
        let mut state = self.inner.lock();
        state.calls.push(RuntimeCall::ReadFile {
            id: id.to_string(),
            path: path.to_string(),
        });
        state
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| RuntimeError::CopyFailed {
                path: path.to_string(),
                message: "no such file".to_string(),
            })
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
