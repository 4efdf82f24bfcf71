// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Config file parsing

use foghorn_core::{
    parse_duration, parse_reference, CheckDefinition, CronExpression, DebugOutputMode, Schedule,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors from loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to open config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(message.into())
}

/// Validated daemon configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub version: Option<String>,
    pub checks: Vec<CheckDefinition>,
    /// Concurrency cap; 0 means unbounded
    pub max_concurrent_checks: usize,
    pub state_log_file: Option<PathBuf>,
    pub state_log_period: Option<Duration>,
    pub secret_store_file: Option<PathBuf>,
    /// Global default for per-check debug output
    pub debug_output: Option<DebugOutputMode>,
    pub debug_output_max_chars: usize,
    pub status_listen: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSchedule {
    #[serde(default)]
    cron: Option<String>,
    #[serde(default)]
    interval: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCheck {
    name: String,
    #[serde(default)]
    image: String,
    #[serde(default)]
    schedule: RawSchedule,
    #[serde(default)]
    enabled: bool,
    #[serde(default)]
    env: HashMap<String, String>,
    #[serde(default)]
    timeout: Option<String>,
    #[serde(default)]
    check_container_debug_output: Option<String>,
    #[serde(default)]
    metadata: Option<serde_yaml::Mapping>,
}

#[derive(Debug, Default, Deserialize)]
struct RawGlobals {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    max_concurrent_checks: Option<i64>,
    #[serde(default)]
    state_log_file: Option<PathBuf>,
    #[serde(default)]
    state_log_period: Option<String>,
    #[serde(default)]
    secret_store_file: Option<PathBuf>,
    #[serde(default)]
    check_container_debug_output: Option<String>,
    #[serde(default)]
    debug_output_max_chars: Option<i64>,
    #[serde(default)]
    status_listen: Option<String>,
    #[serde(default)]
    checks: Vec<RawCheck>,
}

/// Load and validate a config file.
pub fn load(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    load_str(&contents)
}

/// Load and validate config from a YAML string.
pub fn load_str(contents: &str) -> Result<Config, ConfigError> {
    let mut globals = RawGlobals::default();
    let mut raw_checks = Vec::new();

    for document in serde_yaml::Deserializer::from_str(contents) {
        let value = serde_yaml::Value::deserialize(document)?;
        if value.is_null() {
            continue;
        }

        if value.get("name").is_some() {
            raw_checks.push(RawCheck::deserialize(value)?);
            continue;
        }

        let doc = RawGlobals::deserialize(value)?;
        merge_globals(&mut globals, doc, &mut raw_checks);
    }

    build(globals, raw_checks)
}

fn merge_globals(dst: &mut RawGlobals, src: RawGlobals, checks: &mut Vec<RawCheck>) {
    if src.version.is_some() {
        dst.version = src.version;
    }
    if src.max_concurrent_checks.is_some() {
        dst.max_concurrent_checks = src.max_concurrent_checks;
    }
    if src.state_log_file.is_some() {
        dst.state_log_file = src.state_log_file;
    }
    if src.state_log_period.is_some() {
        dst.state_log_period = src.state_log_period;
    }
    if src.secret_store_file.is_some() {
        dst.secret_store_file = src.secret_store_file;
    }
    if src.check_container_debug_output.is_some() {
        dst.check_container_debug_output = src.check_container_debug_output;
    }
    if src.debug_output_max_chars.is_some() {
        dst.debug_output_max_chars = src.debug_output_max_chars;
    }
    if src.status_listen.is_some() {
        dst.status_listen = src.status_listen;
    }
    checks.extend(src.checks);
}

fn build(globals: RawGlobals, raw_checks: Vec<RawCheck>) -> Result<Config, ConfigError> {
    let max_concurrent = globals.max_concurrent_checks.unwrap_or(0);
    if max_concurrent < 0 {
        return Err(invalid("max_concurrent_checks cannot be negative"));
    }

    let state_log_period = match (&globals.state_log_file, &globals.state_log_period) {
        (Some(_), None) => {
            return Err(invalid(
                "state_log_period is required when state_log_file is set",
            ))
        }
        (_, Some(period)) => Some(parse_duration(period).map_err(|e| {
            invalid(format!("state_log_period must be a positive duration: {e}"))
        })?),
        (None, None) => None,
    };

    let debug_output = parse_debug_mode("config", globals.check_container_debug_output.as_deref())?;

    let max_chars = globals.debug_output_max_chars.unwrap_or(0);
    if max_chars < 0 {
        return Err(invalid("debug_output_max_chars cannot be negative"));
    }

    let mut checks = Vec::with_capacity(raw_checks.len());
    for (index, raw) in raw_checks.into_iter().enumerate() {
        checks.push(build_check(index, raw)?);
    }

    let mut seen = std::collections::HashSet::new();
    for check in &checks {
        if !seen.insert(check.name.clone()) {
            return Err(invalid(format!("duplicate check name: {}", check.name)));
        }
    }

    Ok(Config {
        version: globals.version,
        checks,
        max_concurrent_checks: max_concurrent as usize,
        state_log_file: globals.state_log_file,
        state_log_period,
        secret_store_file: globals.secret_store_file,
        debug_output,
        debug_output_max_chars: max_chars as usize,
        status_listen: globals.status_listen,
    })
}

fn build_check(index: usize, raw: RawCheck) -> Result<CheckDefinition, ConfigError> {
    if raw.name.trim().is_empty() {
        return Err(invalid(format!("check {}: name is required", index + 1)));
    }
    let name = raw.name;

    if raw.image.is_empty() {
        return Err(invalid(format!("check {name}: image is required")));
    }
    parse_reference(&raw.image)
        .map_err(|e| invalid(format!("check {name}: invalid image tag: {e}")))?;

    let schedule = match (raw.schedule.cron, raw.schedule.interval) {
        (Some(_), Some(_)) => {
            return Err(invalid(format!(
                "check {name}: only one of cron or interval should be specified"
            )))
        }
        (None, None) => {
            return Err(invalid(format!(
                "check {name}: schedule (cron or interval) is required"
            )))
        }
        (Some(cron), None) => {
            CronExpression::parse(&cron)
                .map_err(|e| invalid(format!("check {name}: {e}")))?;
            Schedule::Cron(cron)
        }
        (None, Some(interval)) => Schedule::Interval(
            parse_duration(&interval)
                .map_err(|e| invalid(format!("check {name}: failed to parse interval: {e}")))?,
        ),
    };

    let timeout = raw
        .timeout
        .map(|t| {
            parse_duration(&t)
                .map_err(|e| invalid(format!("check {name}: failed to parse timeout: {e}")))
        })
        .transpose()?;

    let debug_output = parse_debug_mode(
        &format!("check {name}"),
        raw.check_container_debug_output.as_deref(),
    )?;

    let metadata = raw
        .metadata
        .map(|mapping| {
            let value = serde_json::to_value(&mapping).map_err(|e| {
                invalid(format!("check {name}: metadata is not representable: {e}"))
            })?;
            match value {
                serde_json::Value::Object(map) => Ok(map),
                _ => Err(invalid(format!("check {name}: metadata must be a mapping"))),
            }
        })
        .transpose()?;

    Ok(CheckDefinition {
        name,
        image: raw.image,
        schedule,
        enabled: raw.enabled,
        timeout,
        env: raw.env,
        metadata,
        debug_output,
    })
}

fn parse_debug_mode(
    subject: &str,
    mode: Option<&str>,
) -> Result<Option<DebugOutputMode>, ConfigError> {
    match mode {
        None => Ok(None),
        Some(mode) => {
            DebugOutputMode::parse(mode).map_err(|e| invalid(format!("{subject}: {e}")))
        }
    }
}

/// Whether any check references a `secret://` value.
pub fn uses_secrets(config: &Config) -> bool {
    config
        .checks
        .iter()
        .any(|check| check.env.values().any(|v| v.starts_with("secret://")))
}

#[cfg(test)]
#[path = "loader_tests.rs"]
mod tests;
