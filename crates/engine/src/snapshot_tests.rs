// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::error::ExecuteError;
use crate::executor::ResultCallback;
use crate::scheduler::Scheduler;
use async_trait::async_trait;
use foghorn_core::{CheckDefinition, FakeClock, Schedule};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

struct FakeRunner {
    callback: Mutex<Option<ResultCallback>>,
}

impl FakeRunner {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            callback: Mutex::new(None),
        })
    }

    fn fire(&self, name: &str, status: &str) {
        if let Some(callback) = &*self.callback.lock() {
            callback(name, status, Duration::from_millis(42));
        }
    }
}

#[async_trait]
impl CheckRunner for FakeRunner {
    async fn execute(&self, check: Arc<CheckDefinition>) -> Result<(), ExecuteError> {
        self.fire(&check.name, "pass");
        Ok(())
    }

    fn set_result_callback(&self, callback: ResultCallback) {
        *self.callback.lock() = Some(callback);
    }
}

fn scheduler_with(
    checks: &[(&str, &str)],
) -> (Arc<Scheduler<FakeRunner, FakeClock>>, Arc<FakeRunner>) {
    let clock = FakeClock::at("2024-01-01T12:00:00Z".parse().unwrap());
    let runner = FakeRunner::new();
    let scheduler = Scheduler::new(Arc::clone(&runner), clock, 0);
    for (name, status) in checks {
        scheduler
            .add_check(Arc::new(CheckDefinition::new(
                *name,
                "repo/check:1.0.0",
                Schedule::Interval(Duration::from_secs(60)),
            )))
            .unwrap();
        if !status.is_empty() {
            runner.fire(name, status);
        }
    }
    (scheduler, runner)
}

#[tokio::test]
async fn counts_aggregate_statuses() {
    let (scheduler, _) = scheduler_with(&[
        ("a", "pass"),
        ("b", "pass"),
        ("c", "fail"),
        ("d", "warn"),
        ("e", ""),
    ]);

    let snapshot = scheduler.snapshot();
    assert_eq!(snapshot.counts.total, 5);
    assert_eq!(snapshot.counts.pass, 2);
    assert_eq!(snapshot.counts.fail, 1);
    assert_eq!(snapshot.counts.warn, 1);
    assert_eq!(snapshot.counts.running, 0);
    assert_eq!(snapshot.counts.queued, 0);
    assert_eq!(snapshot.checks["e"].last_status, "unknown");
}

#[tokio::test]
async fn single_pass_check_summary() {
    let (scheduler, _) = scheduler_with(&[("web", "pass")]);

    let snapshot = scheduler.snapshot();
    assert_eq!(snapshot.counts.total, 1);
    assert_eq!(snapshot.counts.pass, 1);
    let check = &snapshot.checks["web"];
    assert_eq!(check.last_status, "pass");
    assert_eq!(check.last_duration_ms, 42);
    assert_eq!(check.schedule_type, ScheduleKind::Interval);
    assert_eq!(check.history.len(), 1);
}

#[tokio::test]
async fn snapshot_is_detached_from_live_state() {
    let (scheduler, runner) = scheduler_with(&[("web", "pass")]);

    let snapshot = scheduler.snapshot();
    runner.fire("web", "fail");
    runner.fire("web", "fail");

    // The earlier snapshot still shows the old state.
    assert_eq!(snapshot.checks["web"].last_status, "pass");
    assert_eq!(snapshot.checks["web"].history.len(), 1);

    let fresh = scheduler.snapshot();
    assert_eq!(fresh.checks["web"].last_status, "fail");
    assert_eq!(fresh.checks["web"].history.len(), 3);
}

#[tokio::test]
async fn snapshot_serializes_with_wire_field_names() {
    let (scheduler, _) = scheduler_with(&[("web", "pass")]);

    let json = serde_json::to_value(scheduler.snapshot()).unwrap();
    assert!(json["generated_at"].is_string());
    assert!(json["started_at"].is_string());
    assert_eq!(json["counts"]["total"], 1);
    assert_eq!(json["counts"]["pass"], 1);
    let check = &json["checks"]["web"];
    assert_eq!(check["name"], "web");
    assert_eq!(check["last_status"], "pass");
    assert_eq!(check["schedule_type"], "interval");
    assert_eq!(check["last_duration_ms"], 42);
    assert!(check["history"].is_array());
    assert!(check["next_run"].is_string());

    // Round-trips through the client-side deserialization.
    let parsed: Snapshot = serde_json::from_value(json).unwrap();
    assert_eq!(parsed.counts.pass, 1);
}

#[tokio::test]
async fn empty_history_and_last_run_are_omitted() {
    let (scheduler, _) = scheduler_with(&[("web", "")]);

    let json = serde_json::to_value(scheduler.snapshot()).unwrap();
    let check = &json["checks"]["web"];
    assert!(check.get("history").is_none());
    assert!(check.get("last_run").is_none());
}
