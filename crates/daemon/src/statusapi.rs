// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP status API: the server the daemon exposes and the client the
//! dashboard (and `foghornd status`) consume.

use anyhow::Result;
use axum::routing::get;
use axum::{Json, Router};
use clap::Args;
use foghorn_core::Clock;
use foghorn_engine::{CheckRunner, Scheduler, Snapshot};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Path serving the scheduler snapshot
pub const STATUS_PATH: &str = "/v1/status";

/// Default bind address for the status API
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:7676";

/// Default base URL for the status client
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:7676";

/// Deadline for each client request (one dashboard refresh)
const CLIENT_TIMEOUT: Duration = Duration::from_secs(2);

/// Build the status router over a live scheduler.
///
/// `GET /v1/status` serves the snapshot; `GET /healthz` answers `ok`.
/// Non-GET methods on the status path get 405 with an `Allow` header.
pub fn router<E, C>(scheduler: Arc<Scheduler<E, C>>) -> Router
where
    E: CheckRunner,
    C: Clock,
{
    Router::new()
        .route(
            STATUS_PATH,
            get(move || {
                let scheduler = Arc::clone(&scheduler);
                async move { Json(scheduler.snapshot()) }
            }),
        )
        .route("/healthz", get(|| async { "ok" }))
}

/// Errors from the status client
#[derive(Debug, Error)]
pub enum StatusClientError {
    #[error("status endpoint returned HTTP {0}")]
    Http(u16),
    #[error("status request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Client for a running daemon's status API
pub struct StatusClient {
    base_url: String,
    client: reqwest::Client,
}

impl StatusClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::builder()
                .timeout(CLIENT_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    /// Fetch the current snapshot.
    pub async fn get_status(&self) -> Result<Snapshot, StatusClientError> {
        let response = self
            .client
            .get(format!("{}{STATUS_PATH}", self.base_url))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StatusClientError::Http(status.as_u16()));
        }
        Ok(response.json().await?)
    }
}

#[derive(Args)]
pub struct StatusArgs {
    /// Base URL of a running daemon's status API
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    url: String,
}

/// `foghornd status`: one dashboard-style refresh, printed.
pub async fn run_status(args: StatusArgs) -> Result<()> {
    let snapshot = StatusClient::new(&args.url).get_status().await?;

    println!(
        "checks: {}  running: {}  queued: {}  pass: {}  fail: {}  warn: {}",
        snapshot.counts.total,
        snapshot.counts.running,
        snapshot.counts.queued,
        snapshot.counts.pass,
        snapshot.counts.fail,
        snapshot.counts.warn,
    );

    let mut names: Vec<&String> = snapshot.checks.keys().collect();
    names.sort();
    for name in names {
        let check = &snapshot.checks[name];
        let state = if check.running {
            "running"
        } else if check.queued {
            "queued"
        } else {
            "idle"
        };
        println!(
            "{:<24} {:<8} {:<8} next {}",
            check.name,
            check.last_status,
            state,
            check.next_run.to_rfc3339(),
        );
    }
    Ok(())
}

#[cfg(test)]
#[path = "statusapi_tests.rs"]
mod tests;
