// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container runtime adapters

mod docker;

pub use docker::DockerCli;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeRuntime, RuntimeCall};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors from container runtime operations
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to pull image {image}: {message}")]
    PullFailed { image: String, message: String },
    #[error("failed to create container: {0}")]
    CreateFailed(String),
    #[error("failed to start container: {0}")]
    StartFailed(String),
    #[error("error waiting for container: {0}")]
    WaitFailed(String),
    #[error("failed to kill container: {0}")]
    KillFailed(String),
    #[error("failed to remove container: {0}")]
    RemoveFailed(String),
    #[error("failed to read container logs: {0}")]
    LogsFailed(String),
    #[error("failed to read {path} from container: {message}")]
    CopyFailed { path: String, message: String },
    #[error("runtime command failed: {0}")]
    CommandFailed(String),
}

/// Everything needed to create a one-shot check container.
#[derive(Debug, Clone, Default)]
pub struct ContainerSpec {
    /// Fully resolved image reference
    pub image: String,
    /// Environment entries as `KEY=VALUE`
    pub env: Vec<String>,
    /// Bind mounts as `host:container[:options]`
    pub binds: Vec<String>,
}

/// Adapter for driving a container runtime.
///
/// One-shot semantics: create, start, wait for exit, read output,
/// remove. The caller owns deadlines for `wait`; every other method
/// bounds its own I/O.
#[async_trait]
pub trait ContainerRuntime: Clone + Send + Sync + 'static {
    /// Check whether an image is available locally
    async fn image_present(&self, image: &str) -> Result<bool, RuntimeError>;

    /// Pull an image, draining the transfer within `timeout`
    async fn pull_image(&self, image: &str, timeout: Duration) -> Result<(), RuntimeError>;

    /// Create a container, returning its id
    async fn create(&self, spec: &ContainerSpec) -> Result<String, RuntimeError>;

    /// Start a created container
    async fn start(&self, id: &str) -> Result<(), RuntimeError>;

    /// Block until the container exits, returning its exit code.
    ///
    /// Callers enforce the per-run deadline by cancelling this future
    /// and killing the container.
    async fn wait(&self, id: &str) -> Result<i64, RuntimeError>;

    /// Deliver a signal (e.g. `SIGKILL`) to a running container
    async fn kill(&self, id: &str, signal: &str) -> Result<(), RuntimeError>;

    /// Force-remove a container
    async fn remove(&self, id: &str) -> Result<(), RuntimeError>;

    /// Read captured output from the selected streams.
    ///
    /// Bytes are returned as the transport delivered them; when they
    /// come off the engine's raw log endpoint they carry the 8-byte
    /// stream-framing headers, which the caller demultiplexes.
    async fn logs(&self, id: &str, stdout: bool, stderr: bool) -> Result<Vec<u8>, RuntimeError>;

    /// Read a single file out of the (stopped) container's filesystem
    async fn read_file(&self, id: &str, path: &str) -> Result<Vec<u8>, RuntimeError>;
}
