// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON-lines check-result log with retention-windowed compaction.
//!
//! One record per line. Every append reads the file back, drops
//! records older than the retention window, and rewrites the result,
//! so the on-disk file never grows past the window. An advisory
//! exclusive lock held for the handle's lifetime keeps a second
//! process from interleaving writes.

use chrono::{DateTime, Utc};
use fs2::FileExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors from state log operations
#[derive(Debug, Error)]
pub enum StateLogError {
    #[error("state log path is required")]
    EmptyPath,
    #[error("state log retention must be positive")]
    InvalidRetention,
    #[error("state log file is locked by another process")]
    AlreadyLocked,
    #[error("state log is closed")]
    Closed,
    #[error("state log is corrupt: {0}")]
    Corrupt(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One persisted check result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    pub check_name: String,
    pub status: String,
    pub duration_ms: i64,
    pub completed_at: DateTime<Utc>,
}

/// Single-writer state log bound to one file.
pub struct StateLog {
    path: PathBuf,
    retention: Duration,
    file: Mutex<Option<File>>,
}

impl StateLog {
    /// Open (or create) the log and take the exclusive advisory lock.
    pub fn open(path: impl Into<PathBuf>, retention: Duration) -> Result<Self, StateLogError> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(StateLogError::EmptyPath);
        }
        if retention.is_zero() {
            return Err(StateLogError::InvalidRetention);
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)?;

        file.try_lock_exclusive()
            .map_err(|_| StateLogError::AlreadyLocked)?;

        Ok(Self {
            path,
            retention,
            file: Mutex::new(Some(file)),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock and close the file.
    pub fn close(&self) {
        let mut guard = self.file.lock();
        if let Some(file) = guard.take() {
            let _ = fs2::FileExt::unlock(&file);
        }
    }

    /// Record one completed check run.
    pub fn record_result(
        &self,
        check_name: &str,
        status: &str,
        duration: Duration,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StateLogError> {
        self.append(StateRecord {
            check_name: check_name.to_string(),
            status: status.to_string(),
            duration_ms: duration.as_millis() as i64,
            completed_at,
        })
    }

    /// Append a record, compacting the retention window in the same
    /// write.
    ///
    /// A corrupt existing body does not block the append: the file is
    /// rewritten with the new record and the corruption is surfaced to
    /// the caller once, after the write succeeded.
    pub fn append(&self, record: StateRecord) -> Result<(), StateLogError> {
        let mut guard = self.file.lock();
        let file = guard.as_mut().ok_or(StateLogError::Closed)?;

        let now = Utc::now();
        let (records, read_err) = match read_all(file) {
            Ok(records) => (records, None),
            Err(e) => (Vec::new(), Some(e)),
        };

        let mut filtered = filter_retained(records, self.retention, now);

        let cutoff = now - chrono::Duration::from_std(self.retention).unwrap_or_else(|_| chrono::Duration::zero());
        if record.completed_at >= cutoff {
            filtered.push(record);
        }
        write_all(file, &filtered)?;

        match read_err {
            Some(e) => Err(StateLogError::Corrupt(e.to_string())),
            None => Ok(()),
        }
    }

    /// Load the retained records, compacting the file when anything
    /// aged out.
    pub fn load(&self) -> Result<Vec<StateRecord>, StateLogError> {
        let mut guard = self.file.lock();
        let file = guard.as_mut().ok_or(StateLogError::Closed)?;

        let records = read_all(file).map_err(|e| StateLogError::Corrupt(e.to_string()))?;
        let total = records.len();
        let filtered = filter_retained(records, self.retention, Utc::now());
        if filtered.len() != total {
            write_all(file, &filtered)?;
        }

        Ok(filtered)
    }
}

impl Drop for StateLog {
    fn drop(&mut self) {
        self.close();
    }
}

/// Latest record per check name, by `completed_at`.
pub fn latest_by_check(records: &[StateRecord]) -> std::collections::HashMap<String, StateRecord> {
    let mut latest: std::collections::HashMap<String, StateRecord> = std::collections::HashMap::new();
    for record in records {
        if record.check_name.is_empty() {
            continue;
        }
        match latest.get(&record.check_name) {
            Some(existing) if record.completed_at <= existing.completed_at => {}
            _ => {
                latest.insert(record.check_name.clone(), record.clone());
            }
        }
    }
    latest
}

fn filter_retained(
    records: Vec<StateRecord>,
    retention: Duration,
    now: DateTime<Utc>,
) -> Vec<StateRecord> {
    let cutoff = now - chrono::Duration::from_std(retention).unwrap_or_else(|_| chrono::Duration::zero());
    records
        .into_iter()
        .filter(|r| r.completed_at >= cutoff)
        .collect()
}

fn read_all(file: &mut File) -> Result<Vec<StateRecord>, StateLogError> {
    file.seek(SeekFrom::Start(0))?;
    let mut data = String::new();
    file.read_to_string(&mut data)?;

    let mut records = Vec::new();
    for line in data.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        records.push(serde_json::from_str(line)?);
    }
    Ok(records)
}

fn write_all(file: &mut File, records: &[StateRecord]) -> Result<(), StateLogError> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;

    let mut buf = Vec::with_capacity(records.len() * 128);
    for record in records {
        serde_json::to_writer(&mut buf, record)?;
        buf.push(b'\n');
    }
    file.write_all(&buf)?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
#[path = "statelog_tests.rs"]
mod tests;
