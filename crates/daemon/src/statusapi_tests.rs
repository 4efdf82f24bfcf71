// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use async_trait::async_trait;
use foghorn_core::{CheckDefinition, FakeClock, Schedule};
use foghorn_engine::{ExecuteError, ResultCallback};
use parking_lot::Mutex;
use std::future::IntoFuture;

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
            callback(name, status, Duration::from_millis(12));
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

async fn serve_scheduler() -> (String, Arc<FakeRunner>) {
    let clock = FakeClock::at("2024-01-01T12:00:00Z".parse().unwrap());
    let runner = FakeRunner::new();
    let scheduler = Scheduler::new(Arc::clone(&runner), clock, 0);
    scheduler
        .add_check(Arc::new(CheckDefinition::new(
            "web",
            "repo/check:1.0.0",
            Schedule::Interval(Duration::from_secs(60)),
        )))
        .unwrap();
    runner.fire("web", "pass");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(axum::serve(listener, router(scheduler)).into_future());

    (format!("http://{addr}"), runner)
}

#[tokio::test]
async fn status_endpoint_serves_the_snapshot() {
    let (base_url, _runner) = serve_scheduler().await;

    let response = reqwest::get(format!("{base_url}{STATUS_PATH}")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "application/json"
    );

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["counts"]["total"], 1);
    assert_eq!(body["counts"]["pass"], 1);
    assert_eq!(body["checks"]["web"]["last_status"], "pass");
}

#[tokio::test]
async fn healthz_answers_ok() {
    let (base_url, _runner) = serve_scheduler().await;

    let response = reqwest::get(format!("{base_url}/healthz")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn non_get_is_rejected_with_allow_header() {
    let (base_url, _runner) = serve_scheduler().await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{base_url}{STATUS_PATH}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 405);
    assert_eq!(response.headers()["allow"].to_str().unwrap(), "GET");
}

#[tokio::test]
async fn unknown_paths_are_not_found() {
    let (base_url, _runner) = serve_scheduler().await;
    let response = reqwest::get(format!("{base_url}/v1/nope")).await.unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn client_round_trips_the_snapshot() {
    let (base_url, runner) = serve_scheduler().await;
    runner.fire("web", "fail");

    let snapshot = StatusClient::new(&base_url).get_status().await.unwrap();
    assert_eq!(snapshot.counts.total, 1);
    assert_eq!(snapshot.counts.fail, 1);
    assert_eq!(snapshot.checks["web"].last_status, "fail");
    assert_eq!(snapshot.checks["web"].history.len(), 2);
}

#[tokio::test]
async fn client_reports_connection_errors() {
    // Port 9 (discard) should refuse quickly.
    let err = StatusClient::new("http://127.0.0.1:9")
        .get_status()
        .await
        .unwrap_err();
    assert!(matches!(err, StatusClientError::Request(_)));
}
