// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn parses_all_units() {
    assert_eq!(parse_duration("30s"), Ok(Duration::from_secs(30)));
    assert_eq!(parse_duration("5m"), Ok(Duration::from_secs(300)));
    assert_eq!(parse_duration("6h"), Ok(Duration::from_secs(21_600)));
    assert_eq!(parse_duration("1d"), Ok(Duration::from_secs(86_400)));
}

#[test]
fn trims_whitespace() {
    assert_eq!(parse_duration("  45s "), Ok(Duration::from_secs(45)));
}

#[test]
fn rejects_bad_input() {
    assert_eq!(parse_duration(""), Err(DurationError::Empty));
    assert_eq!(parse_duration("0m"), Err(DurationError::NonPositive(0)));
    assert_eq!(parse_duration("-5s"), Err(DurationError::NonPositive(-5)));
    assert_eq!(
        parse_duration("5w"),
        Err(DurationError::InvalidUnit("w".to_string()))
    );
    assert_eq!(
        parse_duration("xm"),
        Err(DurationError::InvalidValue("x".to_string()))
    );
    assert!(parse_duration("m").is_err());
}

#[test]
fn formats_most_compact_unit() {
    assert_eq!(format_duration(Duration::from_secs(30)), "30s");
    assert_eq!(format_duration(Duration::from_secs(300)), "5m");
    assert_eq!(format_duration(Duration::from_secs(7200)), "2h");
    assert_eq!(format_duration(Duration::from_secs(86_400)), "1d");
    assert_eq!(format_duration(Duration::from_secs(90)), "90s");
    assert_eq!(format_duration(Duration::ZERO), "0s");
}
