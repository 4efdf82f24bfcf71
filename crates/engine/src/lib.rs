// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! foghorn-engine: the container executor and the check scheduler.

pub mod error;
pub mod executor;
pub mod redact;
pub mod resolver;
pub mod scheduler;
pub mod snapshot;

pub use error::ExecuteError;
pub use executor::{CheckRunner, Executor, ResultCallback, SecretResolver};
pub use resolver::resolve_image;
pub use scheduler::{
    CheckState, HistoryEntry, ResultLogger, ScheduleKind, Scheduler, SchedulerError,
};
pub use snapshot::{CheckStatus, Snapshot, SnapshotCounts};
