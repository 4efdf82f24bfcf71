// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Check scheduler: due-time ticking, a concurrency gate with a
//! priority queue, and per-check state.
//!
//! A check moves `Idle → Running → Idle`, detouring through `Queued`
//! when it comes due while the concurrency cap is saturated. Priority
//! is a check's nominal period: long-period checks dispatch first so a
//! burst of frequent checks cannot starve a daily one.

use crate::error::ExecuteError;
use crate::executor::CheckRunner;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use foghorn_core::{CheckDefinition, Clock, CronExpression, Schedule};
use foghorn_storage::{StateLog, StateLogError};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::watch;

/// Entries kept per check in the rolling result history.
const MAX_HISTORY_ENTRIES: usize = 10;

/// Parked far-future next-run for cron expressions with no upcoming
/// fire within the search horizon.
fn never(now: DateTime<Utc>) -> DateTime<Utc> {
    now + ChronoDuration::days(365 * 100)
}

/// Errors from registering checks
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("check {name}: failed to parse cron expression: {source}")]
    InvalidCron {
        name: String,
        source: foghorn_core::CronError,
    },
    #[error("check {name}: interval must be positive")]
    InvalidInterval { name: String },
}

/// Capability to persist one completed run
pub trait ResultLogger: Send + Sync {
    fn record_result(
        &self,
        check_name: &str,
        status: &str,
        duration: Duration,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StateLogError>;
}

impl ResultLogger for StateLog {
    fn record_result(
        &self,
        check_name: &str,
        status: &str,
        duration: Duration,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StateLogError> {
        StateLog::record_result(self, check_name, status, duration, completed_at)
    }
}

/// One entry in a check's result history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub status: String,
    pub completed_at: DateTime<Utc>,
}

/// Which schedule variant drives a check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    Cron,
    Interval,
}

/// Mutable per-check scheduling state
pub(crate) struct ScheduledCheck {
    pub(crate) definition: Arc<CheckDefinition>,
    pub(crate) schedule_kind: ScheduleKind,
    pub(crate) interval: Duration,
    pub(crate) cron: Option<CronExpression>,
    pub(crate) next_run: DateTime<Utc>,
    pub(crate) last_run: Option<DateTime<Utc>>,
    pub(crate) last_status: String,
    pub(crate) last_duration: Duration,
    pub(crate) running: bool,
    pub(crate) queued: bool,
    pub(crate) history: Vec<HistoryEntry>,
}

/// Persisted state applied to a check at startup
#[derive(Debug, Clone, Default)]
pub struct CheckState {
    pub last_status: String,
    pub last_duration: Duration,
    pub last_run: Option<DateTime<Utc>>,
    pub history: Vec<HistoryEntry>,
}

pub(crate) struct SchedulerState {
    pub(crate) checks: HashMap<String, ScheduledCheck>,
    pub(crate) queue: Vec<String>,
    pub(crate) running: usize,
    pub(crate) result_logger: Option<Arc<dyn ResultLogger>>,
}

/// Owns the registered checks and drives their execution
pub struct Scheduler<E, C: Clock> {
    state: Arc<RwLock<SchedulerState>>,
    executor: Arc<E>,
    clock: C,
    max_concurrent: usize,
    started_at: DateTime<Utc>,
    stop: Mutex<Option<watch::Sender<bool>>>,
}

impl<E: CheckRunner, C: Clock> Scheduler<E, C> {
    /// Build a scheduler around an executor.
    ///
    /// Registers the result callback on the executor: completion-side
    /// bookkeeping and result logging all run under the scheduler's
    /// lock, which totally orders results per check.
    pub fn new(executor: Arc<E>, clock: C, max_concurrent: usize) -> Arc<Self> {
        let state = Arc::new(RwLock::new(SchedulerState {
            checks: HashMap::new(),
            queue: Vec::new(),
            running: 0,
            result_logger: None,
        }));

        let callback_state = Arc::clone(&state);
        let callback_clock = clock.clone();
        executor.set_result_callback(Box::new(move |name, status, duration| {
            handle_check_result(&callback_state, &callback_clock, name, status, duration);
        }));

        Arc::new(Self {
            state,
            executor,
            started_at: clock.now(),
            clock,
            max_concurrent,
            stop: Mutex::new(None),
        })
    }

    /// Wire the result logger used to persist completed runs.
    pub fn set_result_logger(&self, logger: Arc<dyn ResultLogger>) {
        self.state.write().result_logger = Some(logger);
    }

    pub(crate) fn state(&self) -> &Arc<RwLock<SchedulerState>> {
        &self.state
    }

    pub(crate) fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Register a check. A duplicate name replaces the previous entry.
    pub fn add_check(&self, definition: Arc<CheckDefinition>) -> Result<(), SchedulerError> {
        let now = self.clock.now();

        let (schedule_kind, interval, cron, next_run) = match &definition.schedule {
            Schedule::Interval(interval) => {
                if interval.is_zero() {
                    return Err(SchedulerError::InvalidInterval {
                        name: definition.name.clone(),
                    });
                }
                // Interval checks fire on the first tick after
                // registration.
                (ScheduleKind::Interval, *interval, None, now)
            }
            Schedule::Cron(expr) => {
                let cron =
                    CronExpression::parse(expr).map_err(|source| SchedulerError::InvalidCron {
                        name: definition.name.clone(),
                        source,
                    })?;
                let next_run = cron.next(now).unwrap_or_else(|| never(now));
                (ScheduleKind::Cron, Duration::ZERO, Some(cron), next_run)
            }
        };

        tracing::info!(
            check = %definition.name,
            enabled = definition.enabled,
            next_run = %next_run.to_rfc3339(),
            "added check"
        );

        self.state.write().checks.insert(
            definition.name.clone(),
            ScheduledCheck {
                definition,
                schedule_kind,
                interval,
                cron,
                next_run,
                last_run: None,
                last_status: "unknown".to_string(),
                last_duration: Duration::ZERO,
                running: false,
                queued: false,
                history: Vec::new(),
            },
        );

        Ok(())
    }

    /// Unregister a check. In-flight runs finish on their own.
    pub fn remove_check(&self, name: &str) {
        let mut state = self.state.write();
        state.checks.remove(name);
        state.queue.retain(|n| n != name);
    }

    /// Patch persisted state into registered checks.
    ///
    /// Interval checks with a recorded `last_run` resume at
    /// `last_run + interval` instead of firing immediately.
    pub fn apply_state(&self, states: HashMap<String, CheckState>) {
        let mut state = self.state.write();
        for (name, persisted) in states {
            let Some(check) = state.checks.get_mut(&name) else {
                continue;
            };

            if !persisted.last_status.is_empty() {
                check.last_status = persisted.last_status;
            }
            if !persisted.last_duration.is_zero() {
                check.last_duration = persisted.last_duration;
            }
            if let Some(last_run) = persisted.last_run {
                check.last_run = Some(last_run);
                if check.schedule_kind == ScheduleKind::Interval && !check.interval.is_zero() {
                    check.next_run = last_run
                        + ChronoDuration::from_std(check.interval).unwrap_or_else(|_| ChronoDuration::zero());
                }
            }
            if !persisted.history.is_empty() {
                check.history = trim_history(persisted.history);
            }
        }
    }

    /// Start the tick loop. `stop()` ends it; in-flight runs continue.
    pub fn start(self: &Arc<Self>, tick_interval: Duration) {
        tracing::info!(tick_s = tick_interval.as_secs_f64(), "scheduler started");
        let (tx, mut rx) = watch::channel(false);
        *self.stop.lock() = Some(tx);

        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => scheduler.tick(),
                    _ = rx.changed() => {
                        tracing::info!("scheduler stopped");
                        return;
                    }
                }
            }
        });
    }

    /// Signal the tick loop to stop.
    pub fn stop(&self) {
        if let Some(tx) = self.stop.lock().take() {
            tracing::info!("scheduler stopping");
            let _ = tx.send(true);
        }
    }

    /// One scheduling pass: promote queued checks, then dispatch or
    /// enqueue everything that is due.
    pub fn tick(&self) {
        let now = self.clock.now();
        self.process_queue(now);

        let mut due: Vec<(String, ChronoDuration)> = {
            let state = self.state.read();
            state
                .checks
                .iter()
                .filter(|(_, check)| {
                    check.definition.enabled
                        && !check.running
                        && !check.queued
                        && now >= check.next_run
                })
                .map(|(name, check)| (name.clone(), priority_duration(check, now)))
                .collect()
        };

        // Longest period first; ties break on name so ordering is
        // stable.
        due.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        for (name, _) in due {
            self.execute_check(&name, now);
        }
    }

    /// Pop queued checks while capacity allows, then reconcile the
    /// `queued` flags with actual queue membership.
    fn process_queue(&self, now: DateTime<Utc>) {
        if self.max_concurrent == 0 {
            return;
        }

        loop {
            let name = {
                let mut state = self.state.write();
                if state.queue.is_empty() || state.running >= self.max_concurrent {
                    break;
                }
                sort_queue(&mut state, now);
                let name = state.queue.remove(0);
                if let Some(check) = state.checks.get_mut(&name) {
                    check.queued = false;
                }
                let (running, queued) = (state.running, state.queue.len());
                tracing::info!(check = %name, running, queued, "processing queued check");
                name
            };
            self.execute_check(&name, now);
        }

        let mut state = self.state.write();
        let SchedulerState { checks, queue, .. } = &mut *state;
        for (name, check) in checks.iter_mut() {
            check.queued = queue.iter().any(|queued| queued == name);
        }
    }

    /// Dispatch a check, or park it in the queue when the concurrency
    /// gate is closed.
    fn execute_check(&self, name: &str, now: DateTime<Utc>) {
        let definition = {
            let mut state = self.state.write();

            if self.max_concurrent > 0 && state.running >= self.max_concurrent {
                tracing::debug!(
                    check = %name,
                    cap = self.max_concurrent,
                    "queueing check, concurrency limit reached"
                );
                if !state.queue.iter().any(|queued| queued == name) {
                    state.queue.push(name.to_string());
                }
                sort_queue(&mut state, now);
                if let Some(check) = state.checks.get_mut(name) {
                    check.queued = true;
                }
                return;
            }

            let definition = {
                let Some(check) = state.checks.get_mut(name) else {
                    return;
                };
                check.running = true;
                check.queued = false;
                check.last_run = Some(now);
                Arc::clone(&check.definition)
            };
            state.running += 1;
            definition
        };

        tracing::info!(check = %name, "executing check");

        let executor = Arc::clone(&self.executor);
        let state = Arc::clone(&self.state);
        let clock = self.clock.clone();
        let name = name.to_string();
        let started = Instant::now();

        tokio::spawn(async move {
            // Errors are already logged and reported through the
            // result callback; nothing to propagate across runs.
            let _: Result<(), ExecuteError> = executor.execute(definition).await;
            complete_run(&state, &clock, &name, started.elapsed());
        });
    }
}

/// Completion-side mutation: always runs after a dispatched task
/// finishes, whatever the outcome.
fn complete_run(
    state: &Arc<RwLock<SchedulerState>>,
    clock: &impl Clock,
    name: &str,
    elapsed: Duration,
) {
    let now = clock.now();
    let mut state = state.write();
    state.running = state.running.saturating_sub(1);
    let Some(check) = state.checks.get_mut(name) else {
        return;
    };

    check.running = false;
    check.last_duration = elapsed;
    check.next_run = match check.schedule_kind {
        ScheduleKind::Interval if !check.interval.is_zero() => {
            now + ChronoDuration::from_std(check.interval).unwrap_or_else(|_| ChronoDuration::zero())
        }
        _ => match &check.cron {
            Some(cron) => cron.next(now).unwrap_or_else(|| never(now)),
            None => check.next_run,
        },
    };
    check.last_run = Some(now);
    tracing::debug!(
        check = %name,
        next_run = %check.next_run.to_rfc3339(),
        "check completed"
    );
}

/// Result callback: updates status, history, and the result logger.
fn handle_check_result(
    state: &Arc<RwLock<SchedulerState>>,
    clock: &impl Clock,
    name: &str,
    status: &str,
    duration: Duration,
) {
    let completed_at = clock.now();
    let mut state = state.write();

    if let Some(check) = state.checks.get_mut(name) {
        check.last_status = status.to_string();
        check.last_duration = duration;
        check.history.push(HistoryEntry {
            status: status.to_string(),
            completed_at,
        });
        if check.history.len() > MAX_HISTORY_ENTRIES {
            let excess = check.history.len() - MAX_HISTORY_ENTRIES;
            check.history.drain(..excess);
        }
    }

    if let Some(logger) = &state.result_logger {
        if let Err(e) = logger.record_result(name, status, duration, completed_at) {
            tracing::error!(check = %name, error = %e, "failed to persist check result");
        }
    }
}

/// A check's scheduling priority: its nominal period.
fn priority_duration(check: &ScheduledCheck, now: DateTime<Utc>) -> ChronoDuration {
    if check.schedule_kind == ScheduleKind::Interval && !check.interval.is_zero() {
        return ChronoDuration::from_std(check.interval).unwrap_or_else(|_| ChronoDuration::zero());
    }
    if let Some(cron) = &check.cron {
        if let Some(next) = cron.next(now) {
            return next - now;
        }
    }
    check.next_run - now
}

fn sort_queue(state: &mut SchedulerState, now: DateTime<Utc>) {
    if state.queue.len() < 2 {
        return;
    }
    let SchedulerState { checks, queue, .. } = state;
    queue.sort_by(|a, b| {
        let pa = checks
            .get(a)
            .map(|c| priority_duration(c, now))
            .unwrap_or_else(ChronoDuration::zero);
        let pb = checks
            .get(b)
            .map(|c| priority_duration(c, now))
            .unwrap_or_else(ChronoDuration::zero);
        pb.cmp(&pa).then_with(|| a.cmp(b))
    });
}

fn trim_history(mut entries: Vec<HistoryEntry>) -> Vec<HistoryEntry> {
    if entries.len() > MAX_HISTORY_ENTRIES {
        entries.drain(..entries.len() - MAX_HISTORY_ENTRIES);
    }
    entries
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
