// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Docker CLI runtime adapter

use super::{ContainerRuntime, ContainerSpec, RuntimeError};
use crate::subprocess::{run_with_timeout, DOCKER_COMMAND_TIMEOUT, DOCKER_LOGS_TIMEOUT};
use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;

/// Container runtime backed by the `docker` binary.
#[derive(Clone, Default)]
pub struct DockerCli;

impl DockerCli {
    pub fn new() -> Self {
        Self
    }

    fn command(args: &[&str]) -> Command {
        let mut cmd = Command::new("docker");
        cmd.args(args);
        cmd
    }
}

fn stderr_text(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn image_present(&self, image: &str) -> Result<bool, RuntimeError> {
        let output = run_with_timeout(
            Self::command(&["image", "inspect", image]),
            DOCKER_COMMAND_TIMEOUT,
            "docker image inspect",
        )
        .await
        .map_err(RuntimeError::CommandFailed)?;

        if output.status.success() {
            return Ok(true);
        }
        let stderr = stderr_text(&output);
        if stderr.contains("No such image") {
            return Ok(false);
        }
        Err(RuntimeError::CommandFailed(format!(
            "docker image inspect {image}: {stderr}"
        )))
    }

    async fn pull_image(&self, image: &str, timeout: Duration) -> Result<(), RuntimeError> {
        tracing::debug!(image, timeout_s = timeout.as_secs(), "docker pull");
        let output = run_with_timeout(
            Self::command(&["pull", "--quiet", image]),
            timeout,
            "docker pull",
        )
        .await
        .map_err(|message| RuntimeError::PullFailed {
            image: image.to_string(),
            message,
        })?;

        if !output.status.success() {
            return Err(RuntimeError::PullFailed {
                image: image.to_string(),
                message: stderr_text(&output),
            });
        }
        Ok(())
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        let mut cmd = Command::new("docker");
        cmd.arg("create");
        for entry in &spec.env {
            cmd.arg("--env").arg(entry);
        }
        for bind in &spec.binds {
            cmd.arg("--volume").arg(bind);
        }
        cmd.arg(&spec.image);

        let output = run_with_timeout(cmd, DOCKER_COMMAND_TIMEOUT, "docker create")
            .await
            .map_err(RuntimeError::CreateFailed)?;

        if !output.status.success() {
            return Err(RuntimeError::CreateFailed(stderr_text(&output)));
        }
        let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if id.is_empty() {
            return Err(RuntimeError::CreateFailed(
                "docker create printed no container id".to_string(),
            ));
        }
        Ok(id)
    }

    async fn start(&self, id: &str) -> Result<(), RuntimeError> {
        let output = run_with_timeout(
            Self::command(&["start", id]),
            DOCKER_COMMAND_TIMEOUT,
            "docker start",
        )
        .await
        .map_err(RuntimeError::StartFailed)?;

        if !output.status.success() {
            return Err(RuntimeError::StartFailed(stderr_text(&output)));
        }
        Ok(())
    }

    async fn wait(&self, id: &str) -> Result<i64, RuntimeError> {
        // No inner timeout: the executor owns the per-run deadline and
        // cancels this future, which kills the subprocess on drop.
        let mut cmd = Self::command(&["wait", id]);
        cmd.kill_on_drop(true);
        let output = cmd
            .output()
            .await
            .map_err(|e| RuntimeError::WaitFailed(e.to_string()))?;

        if !output.status.success() {
            return Err(RuntimeError::WaitFailed(stderr_text(&output)));
        }
        let text = String::from_utf8_lossy(&output.stdout);
        text.trim()
            .parse()
            .map_err(|_| RuntimeError::WaitFailed(format!("unexpected docker wait output: {text}")))
    }

    async fn kill(&self, id: &str, signal: &str) -> Result<(), RuntimeError> {
        let output = run_with_timeout(
            Self::command(&["kill", "--signal", signal, id]),
            DOCKER_COMMAND_TIMEOUT,
            "docker kill",
        )
        .await
        .map_err(RuntimeError::KillFailed)?;

        if !output.status.success() {
            return Err(RuntimeError::KillFailed(stderr_text(&output)));
        }
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), RuntimeError> {
        let output = run_with_timeout(
            Self::command(&["rm", "--force", id]),
            DOCKER_COMMAND_TIMEOUT,
            "docker rm",
        )
        .await
        .map_err(RuntimeError::RemoveFailed)?;

        if !output.status.success() {
            return Err(RuntimeError::RemoveFailed(stderr_text(&output)));
        }
        Ok(())
    }

    async fn logs(&self, id: &str, stdout: bool, stderr: bool) -> Result<Vec<u8>, RuntimeError> {
        let output = run_with_timeout(
            Self::command(&["logs", id]),
            DOCKER_LOGS_TIMEOUT,
            "docker logs",
        )
        .await
        .map_err(RuntimeError::LogsFailed)?;

        if !output.status.success() {
            return Err(RuntimeError::LogsFailed(stderr_text(&output)));
        }

        // The CLI splits the container's streams across its own
        // stdout/stderr, so select and concatenate here.
        let mut bytes = Vec::new();
        if stdout {
            bytes.extend_from_slice(&output.stdout);
        }
        if stderr {
            bytes.extend_from_slice(&output.stderr);
        }
        Ok(bytes)
    }

    async fn read_file(&self, id: &str, path: &str) -> Result<Vec<u8>, RuntimeError> {
        // `docker cp ... -` emits a tar stream on stdout; the file we
        // asked for is its first (and only) entry.
        let output = run_with_timeout(
            Self::command(&["cp", &format!("{id}:{path}"), "-"]),
            DOCKER_COMMAND_TIMEOUT,
            "docker cp",
        )
        .await
        .map_err(|message| RuntimeError::CopyFailed {
            path: path.to_string(),
            message,
        })?;

        if !output.status.success() {
            return Err(RuntimeError::CopyFailed {
                path: path.to_string(),
                message: stderr_text(&output),
            });
        }

        first_tar_entry(&output.stdout).ok_or_else(|| RuntimeError::CopyFailed {
            path: path.to_string(),
            message: "empty or malformed tar stream".to_string(),
        })
    }
}

/// Extract the contents of the first regular entry in a ustar stream.
///
/// Header layout: 512-byte blocks, entry size as a NUL/space-padded
/// octal string at offset 124, contents in the following blocks.
fn first_tar_entry(data: &[u8]) -> Option<Vec<u8>> {
    let header = data.get(..512)?;
    let size_field = header.get(124..136)?;
    let octal: String = size_field
        .iter()
        .skip_while(|b| **b == b' ' || **b == b'0')
        .take_while(|b| b.is_ascii_digit())
        .map(|b| *b as char)
        .collect();
    if octal.is_empty() && size_field.iter().any(|b| *b == b'0') {
        return Some(Vec::new());
    }
    if octal.is_empty() {
        return None;
    }
    let size = usize::from_str_radix(&octal, 8).ok()?;
    data.get(512..512 + size).map(|s| s.to_vec())
}

#[cfg(test)]
#[path = "docker_tests.rs"]
mod tests;
