// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Immutable status snapshots for the HTTP API and dashboard.

use crate::executor::CheckRunner;
use crate::scheduler::{HistoryEntry, ScheduleKind, Scheduler};
use chrono::{DateTime, Utc};
use foghorn_core::Clock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Aggregate counts across all registered checks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotCounts {
    pub total: usize,
    pub running: usize,
    pub queued: usize,
    pub pass: usize,
    pub fail: usize,
    pub warn: usize,
}

/// Point-in-time summary of one check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckStatus {
    pub name: String,
    pub next_run: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<DateTime<Utc>>,
    pub last_status: String,
    pub last_duration_ms: i64,
    pub running: bool,
    pub queued: bool,
    pub schedule_type: ScheduleKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<HistoryEntry>,
}

/// Point-in-time view of the whole scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub generated_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub counts: SnapshotCounts,
    pub checks: HashMap<String, CheckStatus>,
}

impl<E: CheckRunner, C: Clock> Scheduler<E, C> {
    /// Produce an immutable snapshot under the read lock. History is
    /// deep-copied; nothing in the result aliases scheduler state.
    pub fn snapshot(&self) -> Snapshot {
        let state = self.state().read();

        let mut snapshot = Snapshot {
            generated_at: self.now(),
            started_at: self.started_at(),
            counts: SnapshotCounts {
                total: state.checks.len(),
                running: state.running,
                queued: state.queue.len(),
                ..SnapshotCounts::default()
            },
            checks: HashMap::with_capacity(state.checks.len()),
        };

        for (name, check) in &state.checks {
            match check.last_status.as_str() {
                "pass" => snapshot.counts.pass += 1,
                "fail" => snapshot.counts.fail += 1,
                "warn" => snapshot.counts.warn += 1,
                _ => {}
            }
            snapshot.checks.insert(
                name.clone(),
                CheckStatus {
                    name: name.clone(),
                    next_run: check.next_run,
                    last_run: check.last_run,
                    last_status: check.last_status.clone(),
                    last_duration_ms: check.last_duration.as_millis() as i64,
                    running: check.running,
                    queued: check.queued,
                    schedule_type: check.schedule_kind,
                    history: check.history.clone(),
                },
            );
        }

        snapshot
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
