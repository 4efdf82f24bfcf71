// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon wiring: configuration, state recovery, executor, scheduler,
//! status API, and signal-driven shutdown.

use crate::secret_cli::resolve_store_path;
use crate::statusapi;
use anyhow::{bail, Context, Result};
use clap::Args;
use foghorn_adapters::{ContainerRuntime, DockerCli, RegistryTagLister};
use foghorn_config::Config;
use foghorn_core::SystemClock;
use foghorn_engine::{resolve_image, CheckState, Executor, HistoryEntry, Scheduler};
use foghorn_storage::{latest_by_check, master_key_from_env, SecretStore, StateLog, StateRecord};
use std::collections::HashMap;
use std::future::IntoFuture;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// How often the scheduler looks for due checks.
const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Grace period for draining status API connections at shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Entries of per-check history rebuilt from the state log.
const MAX_RECOVERED_HISTORY: usize = 10;

#[derive(Args)]
pub struct RunArgs {
    /// Path to the configuration file
    #[arg(short = 'c', long = "config")]
    config: PathBuf,

    /// Validate configuration and exit
    #[arg(short = 'd', long = "dry-run")]
    dry_run: bool,

    /// Verify that every enabled check's image resolves and is present
    /// locally, then exit
    #[arg(short = 'i', long = "verify-image-availability")]
    verify_image_availability: bool,

    /// Status API listen address
    #[arg(long = "status-listen")]
    status_listen: Option<String>,

    /// Path to the state log file (overrides the config file)
    #[arg(short = 's', long = "state-log-file")]
    state_log_file: Option<PathBuf>,

    /// Path to the encrypted secret store file
    #[arg(long = "secret-store-file")]
    secret_store_file: Option<PathBuf>,
}

pub async fn run(args: RunArgs) -> Result<()> {
    let config = foghorn_config::load(&args.config)
        .with_context(|| format!("loading config from {}", args.config.display()))?;
    info!(checks = config.checks.len(), "loaded configuration");

    if args.dry_run {
        print_summary(&config);
        return Ok(());
    }

    let runtime = DockerCli::new();
    let tags = RegistryTagLister::new();

    if args.verify_image_availability {
        return verify_image_availability(&config, &runtime, &tags).await;
    }

    // State log + recovered per-check state.
    let state_log_path = args
        .state_log_file
        .clone()
        .or_else(|| config.state_log_file.clone());
    let mut state_log = None;
    let mut recovered = HashMap::new();
    if let Some(path) = state_log_path {
        let retention = config
            .state_log_period
            .context("state_log_period is required when state_log_file is set")?;
        let log = StateLog::open(&path, retention)
            .with_context(|| format!("opening state log at {}", path.display()))?;

        match log.load() {
            Ok(records) => recovered = build_check_states(&records),
            Err(e) => warn!(error = %e, "failed to load state log"),
        }
        state_log = Some(Arc::new(log));
    }

    // Executor, with secrets wired only when the config references any.
    let mut executor =
        Executor::new(runtime, tags).context("creating container executor")?;
    executor.set_debug_output(config.debug_output, config.debug_output_max_chars);

    if foghorn_config::uses_secrets(&config) {
        let store_path = resolve_store_path(
            args.secret_store_file.clone(),
            config.secret_store_file.clone(),
        );
        let master_key = master_key_from_env()?;
        let store = SecretStore::new(&store_path, master_key)?;
        // Probe the store now so a wrong master key fails startup, not
        // the first check run.
        store
            .list_keys()
            .with_context(|| format!("opening secret store at {}", store_path.display()))?;
        info!(store = %store_path.display(), "secret store enabled");
        executor.set_secret_resolver(Arc::new(store));
    }

    // Scheduler, wired to the executor and the result log.
    if config.max_concurrent_checks > 0 {
        info!(cap = config.max_concurrent_checks, "maximum concurrent checks");
    }
    let scheduler = Scheduler::new(
        Arc::new(executor),
        SystemClock,
        config.max_concurrent_checks,
    );
    if let Some(log) = &state_log {
        scheduler.set_result_logger(Arc::clone(log) as _);
    }

    for check in &config.checks {
        scheduler
            .add_check(Arc::new(check.clone()))
            .with_context(|| format!("registering check {}", check.name))?;
    }
    if !recovered.is_empty() {
        scheduler.apply_state(recovered);
    }

    scheduler.start(TICK_INTERVAL);

    // Status API.
    let listen_addr = args
        .status_listen
        .or(config.status_listen)
        .unwrap_or_else(|| statusapi::DEFAULT_LISTEN_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("binding status API to {listen_addr}"))?;
    info!("status API listening on http://{listen_addr}{}", statusapi::STATUS_PATH);

    let router = statusapi::router(Arc::clone(&scheduler));

    // A signal flips the watch channel; the server drains gracefully
    // from the same signal, bounded by the grace period below.
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });
    let mut graceful_rx = shutdown_rx.clone();
    let mut server = tokio::spawn(
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = graceful_rx.changed().await;
            })
            .into_future(),
    );

    tokio::select! {
        _ = shutdown_rx.changed() => {
            match tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => error!(error = %e, "status API server error"),
                Ok(Err(e)) => error!(error = %e, "status API task failed"),
                Err(_elapsed) => {
                    warn!("status API did not drain within the grace period");
                    server.abort();
                }
            }
        }
        result = &mut server => {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(error = %e, "status API server error"),
                Err(e) => error!(error = %e, "status API task failed"),
            }
        }
    }
    scheduler.stop();
    if let Some(log) = &state_log {
        log.close();
    }
    info!("daemon stopped");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sig) => sig,
        Err(e) => {
            error!(error = %e, "failed to install SIGTERM handler");
            return std::future::pending::<()>().await;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
    info!("shutdown signal received");
}

fn print_summary(config: &Config) {
    println!("Configuration loaded successfully");
    if let Some(version) = &config.version {
        println!("Version: {version}");
    }
    let enabled = config.checks.iter().filter(|c| c.enabled).count();
    println!("Checks: {}", config.checks.len());
    println!("Enabled checks: {enabled}");
    println!("Disabled checks: {}", config.checks.len() - enabled);
    if config.max_concurrent_checks > 0 {
        println!("Max concurrent checks: {}", config.max_concurrent_checks);
    } else {
        println!("Max concurrent checks: unlimited");
    }
}

/// Rebuild per-check state from persisted records: the latest record
/// plus up to ten history entries per check, oldest first.
fn build_check_states(records: &[StateRecord]) -> HashMap<String, CheckState> {
    let mut history: HashMap<String, Vec<HistoryEntry>> = HashMap::new();
    for record in records {
        if record.check_name.is_empty() {
            continue;
        }
        history
            .entry(record.check_name.clone())
            .or_default()
            .push(HistoryEntry {
                status: record.status.clone(),
                completed_at: record.completed_at,
            });
    }
    for entries in history.values_mut() {
        entries.sort_by_key(|e| e.completed_at);
        if entries.len() > MAX_RECOVERED_HISTORY {
            let excess = entries.len() - MAX_RECOVERED_HISTORY;
            entries.drain(..excess);
        }
    }

    let mut states: HashMap<String, CheckState> = latest_by_check(records)
        .into_iter()
        .map(|(name, record)| {
            let entries = history.remove(&name).unwrap_or_default();
            (
                name,
                CheckState {
                    last_status: record.status,
                    last_duration: Duration::from_millis(record.duration_ms.max(0) as u64),
                    last_run: Some(record.completed_at),
                    history: entries,
                },
            )
        })
        .collect();

    // Names that only appear in history still get their entries.
    for (name, entries) in history {
        states.entry(name).or_insert_with(|| CheckState {
            history: entries,
            ..CheckState::default()
        });
    }

    states
}

/// Resolve and inspect every enabled check's image, reporting
/// selectors that resolve nowhere and images missing locally.
async fn verify_image_availability<R: ContainerRuntime>(
    config: &Config,
    runtime: &R,
    tags: &RegistryTagLister,
) -> Result<()> {
    info!("validating container images");

    let mut image_checks: HashMap<String, Vec<String>> = HashMap::new();
    let mut unresolved: Vec<(String, String, String)> = Vec::new();

    for check in config.checks.iter().filter(|c| c.enabled) {
        match resolve_image(tags, &check.image).await {
            Ok(resolved) => image_checks
                .entry(resolved)
                .or_default()
                .push(check.name.clone()),
            Err(e) => unresolved.push((check.image.clone(), check.name.clone(), e.to_string())),
        }
    }

    let mut missing: Vec<(String, Vec<String>)> = Vec::new();
    for (image, check_names) in &image_checks {
        if runtime
            .image_present(image)
            .await
            .with_context(|| format!("checking image {image}"))?
        {
            continue;
        }
        warn!(
            image = %image,
            checks = %check_names.join(", "),
            "image not available locally"
        );
        missing.push((image.clone(), check_names.clone()));
    }

    if unresolved.is_empty() && missing.is_empty() {
        info!("all container images validated");
        return Ok(());
    }

    let mut report = String::new();
    if !unresolved.is_empty() {
        report.push_str("the following image selectors could not be resolved:\n");
        for (image, check, reason) in &unresolved {
            report.push_str(&format!("- {image} (required by: {check}, reason: {reason})\n"));
        }
    }
    if !missing.is_empty() {
        report.push_str("the following images are not available locally:\n");
        for (image, checks) in &missing {
            report.push_str(&format!("- {image} (required by: {})\n", checks.join(", ")));
        }
        report.push_str("pull the missing images with:\n");
        for (image, _) in &missing {
            report.push_str(&format!("  docker pull {image}\n"));
        }
    }
    bail!("{report}");
}

#[cfg(test)]
#[path = "app_tests.rs"]
mod tests;
