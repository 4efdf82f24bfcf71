// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Compact duration strings: `<n><s|m|h|d>` with positive `n`.

use std::time::Duration;
use thiserror::Error;

/// Errors from parsing a duration string
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DurationError {
    #[error("duration cannot be empty")]
    Empty,
    #[error("invalid duration value: {0}")]
    InvalidValue(String),
    #[error("duration value must be positive: {0}")]
    NonPositive(i64),
    #[error("invalid duration unit: {0} (must be s, m, h, or d)")]
    InvalidUnit(String),
}

/// Parse a duration like `30s`, `5m`, `6h`, or `1d`.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(DurationError::Empty);
    }

    let unit_start = input
        .char_indices()
        .last()
        .map(|(i, _)| i)
        .unwrap_or_default();
    let (value_str, unit) = input.split_at(unit_start);
    let value: i64 = value_str
        .parse()
        .map_err(|_| DurationError::InvalidValue(value_str.to_string()))?;
    if value <= 0 {
        return Err(DurationError::NonPositive(value));
    }
    let value = value as u64;

    match unit {
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 3600)),
        "d" => Ok(Duration::from_secs(value * 86_400)),
        _ => Err(DurationError::InvalidUnit(unit.to_string())),
    }
}

/// Render a duration back in the most compact whole unit.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs > 0 && secs % 86_400 == 0 {
        format!("{}d", secs / 86_400)
    } else if secs > 0 && secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs > 0 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{secs}s")
    }
}

#[cfg(test)]
#[path = "duration_tests.rs"]
mod tests;
