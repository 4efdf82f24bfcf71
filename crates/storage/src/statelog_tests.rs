// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

fn record(name: &str, status: &str, completed_at: DateTime<Utc>) -> StateRecord {
    StateRecord {
        check_name: name.to_string(),
        status: status.to_string(),
        duration_ms: 120,
        completed_at,
    }
}

#[test]
fn open_requires_path_and_retention() {
    assert!(matches!(
        StateLog::open("", Duration::from_secs(3600)),
        Err(StateLogError::EmptyPath)
    ));
    let dir = tempdir().unwrap();
    assert!(matches!(
        StateLog::open(dir.path().join("state.log"), Duration::ZERO),
        Err(StateLogError::InvalidRetention)
    ));
}

#[test]
fn append_and_load_round_trip() {
    let dir = tempdir().unwrap();
    let log = StateLog::open(dir.path().join("state.log"), Duration::from_secs(3600)).unwrap();

    let now = Utc::now();
    log.append(record("web", "pass", now)).unwrap();
    log.append(record("db", "fail", now)).unwrap();

    let records = log.load().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].check_name, "web");
    assert_eq!(records[1].check_name, "db");
}

#[test]
fn retention_drops_old_records_on_load_and_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.log");
    let log = StateLog::open(&path, Duration::from_secs(3600)).unwrap();

    let now = Utc::now();
    log.append(record("web", "pass", now - chrono::Duration::hours(2)))
        .unwrap();
    log.append(record("web", "fail", now - chrono::Duration::minutes(10)))
        .unwrap();
    log.append(record("web", "pass", now)).unwrap();

    let records = log.load().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].status, "fail");
    assert_eq!(records[1].status, "pass");

    let on_disk = std::fs::read_to_string(&path).unwrap();
    assert_eq!(on_disk.lines().count(), 2);
}

#[test]
fn stale_record_is_not_appended() {
    let dir = tempdir().unwrap();
    let log = StateLog::open(dir.path().join("state.log"), Duration::from_secs(60)).unwrap();

    log.append(record("web", "pass", Utc::now() - chrono::Duration::hours(1)))
        .unwrap();
    assert!(log.load().unwrap().is_empty());
}

#[test]
fn second_opener_fails_with_already_locked() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.log");
    let log = StateLog::open(&path, Duration::from_secs(3600)).unwrap();

    assert!(matches!(
        StateLog::open(&path, Duration::from_secs(3600)),
        Err(StateLogError::AlreadyLocked)
    ));

    // Releasing the first handle frees the lock.
    drop(log);
    assert!(StateLog::open(&path, Duration::from_secs(3600)).is_ok());
}

#[test]
fn corrupt_body_surfaces_once_but_append_wins() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.log");
    let log = StateLog::open(&path, Duration::from_secs(3600)).unwrap();

    std::fs::write(&path, "not json at all\n").unwrap();

    let err = log.append(record("web", "pass", Utc::now())).unwrap_err();
    assert!(matches!(err, StateLogError::Corrupt(_)));

    // The corrupt body was overwritten; the log keeps working.
    log.append(record("web", "fail", Utc::now())).unwrap();
    let records = log.load().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].status, "pass");
}

#[test]
fn records_serialize_with_rfc3339_utc() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.log");
    let log = StateLog::open(&path, Duration::from_secs(3600)).unwrap();

    let at = "2024-05-04T03:02:01Z".parse().unwrap();
    // Keep the record inside the retention window relative to now by
    // using record_result's caller-provided timestamp near now.
    log.record_result("web", "pass", Duration::from_millis(250), Utc::now())
        .unwrap();
    let body = std::fs::read_to_string(&path).unwrap();
    let line: serde_json::Value = serde_json::from_str(body.lines().next().unwrap()).unwrap();
    assert_eq!(line["check_name"], "web");
    assert_eq!(line["status"], "pass");
    assert_eq!(line["duration_ms"], 250);
    assert!(line["completed_at"].as_str().unwrap().ends_with('Z')
        || line["completed_at"].as_str().unwrap().contains("+00:00"));

    // And a fixed timestamp parses back to the same instant.
    let record = record("db", "warn", at);
    let json = serde_json::to_string(&record).unwrap();
    let parsed: StateRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.completed_at, at);
}

#[test]
fn latest_by_check_picks_newest_per_name() {
    let now = Utc::now();
    let records = vec![
        record("web", "pass", now - chrono::Duration::minutes(5)),
        record("web", "fail", now),
        record("db", "warn", now - chrono::Duration::minutes(1)),
        record("", "pass", now),
    ];

    let latest = latest_by_check(&records);
    assert_eq!(latest.len(), 2);
    assert_eq!(latest["web"].status, "fail");
    assert_eq!(latest["db"].status, "warn");
}

#[test]
fn closed_log_rejects_writes() {
    let dir = tempdir().unwrap();
    let log = StateLog::open(dir.path().join("state.log"), Duration::from_secs(3600)).unwrap();
    log.close();
    assert!(matches!(
        log.append(record("web", "pass", Utc::now())),
        Err(StateLogError::Closed)
    ));
    assert!(matches!(log.load(), Err(StateLogError::Closed)));
}
