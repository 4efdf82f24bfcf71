// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container executor: one check definition in, one result out.
//!
//! A run resolves the image (caching the answer), pulls it if absent,
//! materializes secrets into a per-run directory, creates and starts a
//! container, waits under the check's deadline, and interprets the exit
//! code and stdout verdict. Whatever happens, the result callback fires
//! exactly once and the secret directory is removed.

use crate::error::ExecuteError;
use crate::redact::{redact_output, truncate_output};
use crate::resolver::resolve_image;
use async_trait::async_trait;
use chrono::Utc;
use foghorn_adapters::subprocess::DOCKER_PULL_TIMEOUT;
use foghorn_adapters::{ContainerRuntime, ContainerSpec, TagLister};
use foghorn_core::{format_duration, CheckDefinition, CheckVerdict, DebugOutputMode};
use foghorn_storage::{parse_secret_ref, SecretError, SecretStore};
use parking_lot::Mutex;
use rand::rngs::OsRng;
use rand::RngCore;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout_at;

/// Default per-run timeout when a check does not set one.
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the per-run secret directory is mounted inside the container.
const SECRETS_MOUNT: &str = "/run/foghorn/secrets";

/// Per-run secret directories older than this are swept at startup.
const SECRET_DIR_MAX_AGE: Duration = Duration::from_secs(24 * 3600);

const DEFAULT_DEBUG_MAX_CHARS: usize = 4096;

/// Callback invoked exactly once per run with (name, status, duration)
pub type ResultCallback = Box<dyn Fn(&str, &str, Duration) + Send + Sync>;

/// Capability to dereference `secret://` values to plaintext
pub trait SecretResolver: Send + Sync {
    fn resolve(&self, reference: &str) -> Result<String, SecretError>;
}

impl SecretResolver for SecretStore {
    fn resolve(&self, reference: &str) -> Result<String, SecretError> {
        SecretStore::resolve(self, reference)
    }
}

/// Capability the scheduler dispatches through
#[async_trait]
pub trait CheckRunner: Send + Sync + 'static {
    /// Run one check to completion
    async fn execute(&self, check: Arc<CheckDefinition>) -> Result<(), ExecuteError>;

    /// Register the sink that receives every run's result
    fn set_result_callback(&self, callback: ResultCallback);
}

/// Executes checks as one-shot containers
pub struct Executor<R, T> {
    runtime: R,
    tags: T,
    secret_resolver: Option<Arc<dyn SecretResolver>>,
    secret_base_dir: PathBuf,
    /// Resolutions cached for the process lifetime, keyed by the
    /// original image string
    resolved_images: Mutex<HashMap<String, String>>,
    debug_output: DebugOutputMode,
    debug_max_chars: usize,
    callback: Mutex<Option<ResultCallback>>,
}

/// Environment assembled for one run
struct EnvBundle {
    vars: Vec<String>,
    secret_dir: Option<PathBuf>,
    secrets_to_redact: Vec<String>,
}

impl<R: ContainerRuntime, T: TagLister> Executor<R, T> {
    /// Create an executor with the default secret base directory
    /// (`<tmp>/foghorn-secrets`).
    pub fn new(runtime: R, tags: T) -> std::io::Result<Self> {
        Self::with_secret_base(runtime, tags, std::env::temp_dir().join("foghorn-secrets"))
    }

    /// Create an executor rooted at an explicit secret base directory.
    pub fn with_secret_base(
        runtime: R,
        tags: T,
        secret_base_dir: PathBuf,
    ) -> std::io::Result<Self> {
        create_private_dir(&secret_base_dir)?;
        if let Err(e) = cleanup_old_secret_dirs(&secret_base_dir) {
            tracing::warn!(error = %e, "failed to clean up old secret directories");
        }

        Ok(Self {
            runtime,
            tags,
            secret_resolver: None,
            secret_base_dir,
            resolved_images: Mutex::new(HashMap::new()),
            debug_output: DebugOutputMode::Off,
            debug_max_chars: DEFAULT_DEBUG_MAX_CHARS,
            callback: Mutex::new(None),
        })
    }

    /// Wire the secret store; without one, `secret://` values fail the
    /// run.
    pub fn set_secret_resolver(&mut self, resolver: Arc<dyn SecretResolver>) {
        self.secret_resolver = Some(resolver);
    }

    /// Set the global debug-output default and size cap.
    pub fn set_debug_output(&mut self, mode: Option<DebugOutputMode>, max_chars: usize) {
        self.debug_output = mode.unwrap_or(DebugOutputMode::Off);
        self.debug_max_chars = if max_chars > 0 {
            max_chars
        } else {
            DEFAULT_DEBUG_MAX_CHARS
        };
    }

    async fn run(&self, check: &CheckDefinition) -> Result<String, ExecuteError> {
        let timeout = check.timeout.unwrap_or(DEFAULT_CHECK_TIMEOUT);
        let deadline = tokio::time::Instant::now() + timeout;

        let image = bounded(deadline, timeout, self.resolve_cached(&check.image)).await??;
        self.ensure_image_available(&image, &check.name, deadline, timeout)
            .await?;

        tracing::debug!(
            check = %check.name,
            image = %image,
            timeout_s = timeout.as_secs(),
            "creating container"
        );

        let env = self.build_env(check)?;
        let result = self
            .run_container(check, &image, &env, deadline, timeout)
            .await;

        if let Some(dir) = &env.secret_dir {
            if let Err(e) = std::fs::remove_dir_all(dir) {
                tracing::warn!(
                    check = %check.name,
                    dir = %dir.display(),
                    error = %e,
                    "failed to remove per-run secret directory"
                );
            }
        }

        result
    }

    async fn run_container(
        &self,
        check: &CheckDefinition,
        image: &str,
        env: &EnvBundle,
        deadline: tokio::time::Instant,
        timeout: Duration,
    ) -> Result<String, ExecuteError> {
        let mut spec = ContainerSpec {
            image: image.to_string(),
            env: env.vars.clone(),
            binds: Vec::new(),
        };
        if let Some(dir) = &env.secret_dir {
            spec.binds.push(format!("{}:{SECRETS_MOUNT}:ro", dir.display()));
        }

        let id = match bounded(deadline, timeout, self.runtime.create(&spec)).await? {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(check = %check.name, container = "none", error = %e, "failed to create container");
                return Err(e.into());
            }
        };
        tracing::debug!(check = %check.name, container = %id, "container created");

        let result = self
            .supervise(check, &id, deadline, timeout, env)
            .await;

        if let Err(e) = self.runtime.remove(&id).await {
            tracing::warn!(check = %check.name, container = %id, error = %e, "failed to remove container");
        }

        result
    }

    async fn supervise(
        &self,
        check: &CheckDefinition,
        id: &str,
        deadline: tokio::time::Instant,
        timeout: Duration,
        env: &EnvBundle,
    ) -> Result<String, ExecuteError> {
        bounded(deadline, timeout, self.runtime.start(id)).await??;
        tracing::debug!(check = %check.name, container = %id, "container started");

        let debug_mode = check.debug_output.unwrap_or(self.debug_output);

        let exit_code = match timeout_at(deadline, self.runtime.wait(id)).await {
            Ok(result) => result?,
            Err(_elapsed) => {
                tracing::warn!(
                    check = %check.name,
                    container = %id,
                    timeout_s = timeout.as_secs(),
                    "check execution timed out"
                );
                if let Err(e) = self.runtime.kill(id, "SIGKILL").await {
                    tracing::warn!(check = %check.name, container = %id, error = %e, "failed to kill container");
                }
                return Err(ExecuteError::Timeout { timeout });
            }
        };

        if exit_code != 0 {
            if debug_mode.should_log(true) {
                self.log_debug_output(check, id, "failure", &env.secrets_to_redact)
                    .await;
            }
            return Err(ExecuteError::FailedExit { code: exit_code });
        }

        let verdict = self.read_verdict(id, deadline, timeout).await?;
        if debug_mode.should_log(false) {
            self.log_debug_output(check, id, "success", &env.secrets_to_redact)
                .await;
        }
        tracing::info!(
            check = %check.name,
            status = %verdict.status,
            duration_ms = verdict.duration_ms,
            message = %verdict.message,
            "check completed"
        );
        Ok(verdict.status)
    }

    /// Parse the verdict from stdout; retry from the last `{`; fall
    /// back to `/output/result.json` inside the container.
    async fn read_verdict(
        &self,
        id: &str,
        deadline: tokio::time::Instant,
        timeout: Duration,
    ) -> Result<CheckVerdict, ExecuteError> {
        let raw = bounded(deadline, timeout, self.runtime.logs(id, true, false)).await??;
        let text = String::from_utf8_lossy(&demultiplex(&raw)).trim().to_string();

        let parse_err = match serde_json::from_str::<CheckVerdict>(&text) {
            Ok(verdict) => return Ok(verdict),
            Err(e) => e,
        };

        if let Some(brace) = text.rfind('{') {
            if let Ok(verdict) = serde_json::from_str::<CheckVerdict>(&text[brace..]) {
                return Ok(verdict);
            }
        }

        if let Ok(Ok(contents)) = timeout_at(
            deadline,
            self.runtime.read_file(id, "/output/result.json"),
        )
        .await
        {
            if let Ok(verdict) = serde_json::from_slice::<CheckVerdict>(&contents) {
                return Ok(verdict);
            }
        }

        Err(ExecuteError::UnparseableVerdict(parse_err.to_string()))
    }

    /// Build the container environment, materializing secrets.
    fn build_env(&self, check: &CheckDefinition) -> Result<EnvBundle, ExecuteError> {
        let mut vars = vec![format!("FOGHORN_CHECK_NAME={}", check.name)];
        let mut secrets_to_redact = Vec::new();
        let mut secret_dir: Option<PathBuf> = None;

        if let Some(metadata) = &check.metadata {
            if let Ok(json) = serde_json::to_string(metadata) {
                vars.push(format!("FOGHORN_CHECK_CONFIG={json}"));
            }
        }

        if let Some(endpoint) = check.env.get("ENDPOINT") {
            vars.push(format!("FOGHORN_ENDPOINT={endpoint}"));
            vars.push(format!("ENDPOINT={endpoint}"));
        }

        if let Some(timeout) = check.timeout {
            vars.push(format!("FOGHORN_TIMEOUT={}", format_duration(timeout)));
        }

        // Deterministic iteration keeps env construction reproducible.
        let mut entries: Vec<(&String, &String)> = check.env.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));

        for (key, value) in entries.iter().copied() {
            let Some(ref_key) = parse_secret_ref(value) else {
                continue;
            };

            let resolver =
                self.secret_resolver
                    .as_ref()
                    .ok_or_else(|| ExecuteError::SecretsDisabled {
                        key: ref_key.to_string(),
                    })?;
            let plaintext = resolver.resolve(value)?;
            if plaintext.is_empty() {
                return Err(ExecuteError::EmptySecret {
                    key: ref_key.to_string(),
                });
            }

            let dir = match &secret_dir {
                Some(dir) => dir.clone(),
                None => {
                    let dir = self.create_secret_dir().map_err(|source| {
                        ExecuteError::SecretWriteFailed {
                            key: key.clone(),
                            source,
                        }
                    })?;
                    secret_dir = Some(dir.clone());
                    dir
                }
            };

            let filename = sanitize_secret_filename(key.as_str());
            write_secret_file(&dir.join(&filename), plaintext.as_bytes()).map_err(|source| {
                ExecuteError::SecretWriteFailed {
                    key: key.clone(),
                    source,
                }
            })?;
            tracing::debug!(
                check = %check.name,
                secret = %ref_key,
                "injected secret reference into {key}_FILE"
            );
            vars.push(format!("{key}_FILE={SECRETS_MOUNT}/{filename}"));
            secrets_to_redact.push(plaintext);
        }

        for (key, value) in entries.iter().copied() {
            if parse_secret_ref(value).is_some() {
                continue;
            }
            if !key.starts_with("FOGHORN_") && key.as_str() != "ENDPOINT" {
                vars.push(format!("{key}={value}"));
            }
        }

        Ok(EnvBundle {
            vars,
            secret_dir,
            secrets_to_redact,
        })
    }

    /// Resolve with the process-wide cache.
    async fn resolve_cached(&self, image: &str) -> Result<String, ExecuteError> {
        if let Some(resolved) = self.resolved_images.lock().get(image) {
            return Ok(resolved.clone());
        }

        let resolved = resolve_image(&self.tags, image).await?;
        self.resolved_images
            .lock()
            .insert(image.to_string(), resolved.clone());
        Ok(resolved)
    }

    async fn ensure_image_available(
        &self,
        image: &str,
        check_name: &str,
        deadline: tokio::time::Instant,
        timeout: Duration,
    ) -> Result<(), ExecuteError> {
        if bounded(deadline, timeout, self.runtime.image_present(image)).await?? {
            return Ok(());
        }

        tracing::info!(check = %check_name, image = %image, "pulling image");
        self.runtime.pull_image(image, DOCKER_PULL_TIMEOUT).await?;
        Ok(())
    }

    async fn log_debug_output(
        &self,
        check: &CheckDefinition,
        id: &str,
        reason: &str,
        secrets: &[String],
    ) {
        // Fresh short deadline: the run's own deadline may already be
        // spent by the time we get here.
        let raw = match tokio::time::timeout(
            Duration::from_secs(5),
            self.runtime.logs(id, true, true),
        )
        .await
        {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                tracing::debug!(check = %check.name, reason, error = %e, "failed to read container output");
                return;
            }
            Err(_elapsed) => {
                tracing::debug!(check = %check.name, reason, "timed out reading container output");
                return;
            }
        };

        let text = String::from_utf8_lossy(&demultiplex(&raw)).trim().to_string();
        if text.is_empty() {
            tracing::debug!(check = %check.name, reason, "container output was empty");
            return;
        }
        let redacted = redact_output(&text, secrets);
        tracing::debug!(
            check = %check.name,
            reason,
            output = %truncate_output(&redacted, self.debug_max_chars),
            "container output"
        );
    }

    fn create_secret_dir(&self) -> std::io::Result<PathBuf> {
        let mut suffix = [0u8; 8];
        OsRng.fill_bytes(&mut suffix);
        let dir = self
            .secret_base_dir
            .join(suffix.iter().map(|b| format!("{b:02x}")).collect::<String>());
        create_dir_with_mode(&dir, 0o755)?;

        let stamp = Utc::now().to_rfc3339();
        if let Err(e) = write_timestamp_file(&dir.join(".timestamp"), stamp.as_bytes()) {
            let _ = std::fs::remove_dir_all(&dir);
            return Err(e);
        }
        Ok(dir)
    }
}

#[async_trait]
impl<R: ContainerRuntime, T: TagLister> CheckRunner for Executor<R, T> {
    async fn execute(&self, check: Arc<CheckDefinition>) -> Result<(), ExecuteError> {
        let start = Instant::now();
        let result = self.run(&check).await;
        let duration = start.elapsed();

        let status = match &result {
            Ok(status) => status.clone(),
            Err(_) => "error".to_string(),
        };
        if let Some(callback) = &*self.callback.lock() {
            callback(&check.name, &status, duration);
        }

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::error!(check = %check.name, error = %e, "check run failed");
                Err(e)
            }
        }
    }

    fn set_result_callback(&self, callback: ResultCallback) {
        *self.callback.lock() = Some(callback);
    }
}

/// Bound a runtime call by the run deadline, translating expiry into
/// the run-level timeout error.
async fn bounded<F, O>(
    deadline: tokio::time::Instant,
    timeout: Duration,
    future: F,
) -> Result<O, ExecuteError>
where
    F: std::future::Future<Output = O>,
{
    timeout_at(deadline, future)
        .await
        .map_err(|_| ExecuteError::Timeout { timeout })
}

/// Strip the engine's stream framing when present: 8-byte headers with
/// a stream byte, three zero bytes, and a big-endian frame length.
/// Unframed bytes (e.g. from the CLI transport) pass through untouched.
pub(crate) fn demultiplex(data: &[u8]) -> Vec<u8> {
    let framed = data.len() >= 8 && matches!(data[0], 0..=2) && data[1..4] == [0, 0, 0];
    if !framed {
        return data.to_vec();
    }

    let mut result = Vec::with_capacity(data.len());
    let mut rest = data;
    while rest.len() >= 8 {
        let frame_size = u32::from_be_bytes([rest[4], rest[5], rest[6], rest[7]]) as usize;
        rest = &rest[8..];
        if frame_size > rest.len() {
            break;
        }
        result.extend_from_slice(&rest[..frame_size]);
        rest = &rest[frame_size..];
    }
    result
}

fn sanitize_secret_filename(input: &str) -> String {
    let sanitized: String = input
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        "secret".to_string()
    } else {
        sanitized
    }
}

/// Sweep per-run secret directories whose timestamp shows them older
/// than a day; directories without a readable timestamp are left alone.
fn cleanup_old_secret_dirs(base: &Path) -> std::io::Result<()> {
    let entries = match std::fs::read_dir(base) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    let cutoff = Utc::now()
        - chrono::Duration::from_std(SECRET_DIR_MAX_AGE).unwrap_or_else(|_| chrono::Duration::hours(24));

    for entry in entries {
        let entry = entry?;
        if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }
        let dir = entry.path();

        let Ok(stamp) = std::fs::read_to_string(dir.join(".timestamp")) else {
            continue;
        };
        let Ok(at) = chrono::DateTime::parse_from_rfc3339(stamp.trim()) else {
            continue;
        };
        if at.with_timezone(&Utc) < cutoff && std::fs::remove_dir_all(&dir).is_ok() {
            tracing::debug!(dir = %dir.display(), "cleaned up old secret directory");
        }
    }
    Ok(())
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(dir)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)
}

#[cfg(unix)]
fn create_dir_with_mode(dir: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new().mode(mode).create(dir)
}

#[cfg(not(unix))]
fn create_dir_with_mode(dir: &Path, _mode: u32) -> std::io::Result<()> {
    std::fs::create_dir(dir)
}

fn write_secret_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    write_with_mode(path, contents, 0o644)
}

fn write_timestamp_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    write_with_mode(path, contents, 0o600)
}

fn write_with_mode(path: &Path, contents: &[u8], mode: u32) -> std::io::Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    let mut file = options.open(path)?;
    std::io::Write::write_all(&mut file, contents)
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
