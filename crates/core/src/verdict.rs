// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Check verdict: the JSON document a check container emits.

use serde::{Deserialize, Serialize};

/// Outcome reported by a check container on stdout (or at
/// `/output/result.json` as a fallback).
///
/// `status` is free-form; `pass`, `fail`, `warn`, `unknown`, and `error`
/// are the conventional values the dashboard understands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckVerdict {
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub duration_ms: i64,
}

#[cfg(test)]
#[path = "verdict_tests.rs"]
mod tests;
