// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for check execution

use foghorn_adapters::{RegistryError, RuntimeError};
use foghorn_core::ImageError;
use foghorn_storage::SecretError;
use std::time::Duration;
use thiserror::Error;

/// Errors from a single check run.
///
/// Every variant fails only the run it occurred in; the scheduler
/// records an `"error"` result and keeps going.
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error("no versions match selector {selector:?} for {repository}")]
    NoMatchingTag {
        selector: String,
        repository: String,
    },
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("check execution timed out after {}s", timeout.as_secs())]
    Timeout { timeout: Duration },
    #[error("check failed with exit code {code}")]
    FailedExit { code: i64 },
    #[error("failed to parse check verdict: {0}")]
    UnparseableVerdict(String),
    #[error("check requires secret {key:?}, but the secret store is not configured")]
    SecretsDisabled { key: String },
    #[error("failed to resolve secret: {0}")]
    Secret(#[from] SecretError),
    #[error("secret {key:?} resolved to an empty value")]
    EmptySecret { key: String },
    #[error("failed to write secret file for {key}: {source}")]
    SecretWriteFailed {
        key: String,
        source: std::io::Error,
    },
}
