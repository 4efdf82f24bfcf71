// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Check definitions: the immutable description of a scheduled check.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// How a check is scheduled: exactly one of a cron expression or a
/// fixed interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    Cron(String),
    Interval(Duration),
}

/// When to emit a check container's output to the daemon log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebugOutputMode {
    Off,
    OnFailure,
    Always,
}

impl DebugOutputMode {
    /// Whether container output should be logged for a run with the
    /// given outcome.
    pub fn should_log(self, failed: bool) -> bool {
        match self {
            DebugOutputMode::Always => true,
            DebugOutputMode::OnFailure => failed,
            DebugOutputMode::Off => false,
        }
    }

    /// Parse a mode name, treating empty/whitespace as "not set".
    pub fn parse(mode: &str) -> Result<Option<Self>, String> {
        match mode.trim() {
            "" => Ok(None),
            "off" => Ok(Some(DebugOutputMode::Off)),
            "on_failure" => Ok(Some(DebugOutputMode::OnFailure)),
            "always" => Ok(Some(DebugOutputMode::Always)),
            other => Err(format!(
                "debug output mode must be one of off, on_failure, always (got {other:?})"
            )),
        }
    }
}

impl fmt::Display for DebugOutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DebugOutputMode::Off => "off",
            DebugOutputMode::OnFailure => "on_failure",
            DebugOutputMode::Always => "always",
        };
        write!(f, "{name}")
    }
}

/// Immutable definition of a registered check.
///
/// Built by the configuration loader; the scheduler and executor only
/// ever borrow it.
#[derive(Debug, Clone)]
pub struct CheckDefinition {
    /// Unique check name (primary key within a scheduler)
    pub name: String,
    /// Image reference with a mandatory non-`latest` tag
    pub image: String,
    pub schedule: Schedule,
    pub enabled: bool,
    /// Per-run timeout; the executor default (30s) applies when unset
    pub timeout: Option<Duration>,
    /// Container environment; values may be `secret://<key>` references
    pub env: HashMap<String, String>,
    /// Opaque mapping forwarded to the container as JSON
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
    /// Per-check debug output override; global default applies when unset
    pub debug_output: Option<DebugOutputMode>,
}

impl CheckDefinition {
    /// Minimal definition for a named check; everything else defaulted.
    pub fn new(name: impl Into<String>, image: impl Into<String>, schedule: Schedule) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            schedule,
            enabled: true,
            timeout: None,
            env: HashMap::new(),
            metadata: None,
            debug_output: None,
        }
    }
}

#[cfg(test)]
#[path = "check_tests.rs"]
mod tests;
