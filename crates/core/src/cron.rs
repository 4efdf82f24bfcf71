// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Five-field cron expression parsing and next-fire computation.
//!
//! Fields are minute, hour, day-of-month, month, and day-of-week
//! (0 = Sunday). Day-of-month and day-of-week are combined with AND:
//! both must match for a timestamp to fire. Each field is expanded to a
//! full membership set at parse time, so matching a timestamp is five
//! set lookups.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Errors from parsing a cron expression
#[derive(Debug, Error)]
pub enum CronError {
    #[error("invalid cron expression: expected 5 fields, got {0}")]
    FieldCount(usize),
    #[error("invalid {field} field: {message}")]
    Field { field: &'static str, message: String },
}

impl CronError {
    fn field(field: &'static str, message: impl Into<String>) -> Self {
        Self::Field {
            field,
            message: message.into(),
        }
    }
}

/// One parsed cron field: the set of values it matches
#[derive(Debug, Clone)]
struct CronField {
    values: HashSet<u32>,
}

impl CronField {
    fn matches(&self, value: u32) -> bool {
        self.values.contains(&value)
    }
}

/// A parsed five-field cron expression
#[derive(Debug, Clone)]
pub struct CronExpression {
    minute: CronField,
    hour: CronField,
    day_of_month: CronField,
    month: CronField,
    day_of_week: CronField,
}

impl CronExpression {
    /// Parse a five-field cron expression.
    pub fn parse(expr: &str) -> Result<Self, CronError> {
        let parts: Vec<&str> = expr.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(CronError::FieldCount(parts.len()));
        }

        Ok(Self {
            minute: parse_field(parts[0], 0, 59).map_err(|e| CronError::field("minute", e))?,
            hour: parse_field(parts[1], 0, 23).map_err(|e| CronError::field("hour", e))?,
            day_of_month: parse_field(parts[2], 1, 31)
                .map_err(|e| CronError::field("day of month", e))?,
            month: parse_field(parts[3], 1, 12).map_err(|e| CronError::field("month", e))?,
            day_of_week: parse_field(parts[4], 0, 6)
                .map_err(|e| CronError::field("day of week", e))?,
        })
    }

    /// Compute the next fire time strictly after `t`.
    ///
    /// Scans minute by minute from `t + 1 minute` (truncated to the
    /// minute). Returns `None` when no minute matches within ten years,
    /// which can happen for impossible day-of-month/month combinations.
    pub fn next(&self, t: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut next = truncate_to_minute(t + Duration::minutes(1));

        loop {
            if self.matches(next) {
                return Some(next);
            }
            next += Duration::minutes(1);
            if next.year() > t.year() + 10 {
                return None;
            }
        }
    }

    fn matches(&self, t: DateTime<Utc>) -> bool {
        self.minute.matches(t.minute())
            && self.hour.matches(t.hour())
            && self.day_of_month.matches(t.day())
            && self.month.matches(t.month())
            && self.day_of_week.matches(t.weekday().num_days_from_sunday())
    }
}

fn truncate_to_minute(t: DateTime<Utc>) -> DateTime<Utc> {
    t - Duration::nanoseconds(i64::from(t.nanosecond())) - Duration::seconds(i64::from(t.second()))
}

fn parse_field(field: &str, min: u32, max: u32) -> Result<CronField, String> {
    let mut values = HashSet::new();

    if field == "*" {
        values.extend(min..=max);
        return Ok(CronField { values });
    }

    for part in field.split(',') {
        parse_part(part, min, max, &mut values)?;
    }

    Ok(CronField { values })
}

fn parse_part(part: &str, min: u32, max: u32, values: &mut HashSet<u32>) -> Result<(), String> {
    if part.contains('/') {
        return parse_step(part, min, max, values);
    }
    if part.contains('-') {
        return parse_range(part, min, max, values);
    }

    let val: u32 = part.parse().map_err(|_| format!("invalid value: {part}"))?;
    if val < min || val > max {
        return Err(format!("value {val} out of range [{min}, {max}]"));
    }
    values.insert(val);
    Ok(())
}

fn parse_range(part: &str, min: u32, max: u32, values: &mut HashSet<u32>) -> Result<(), String> {
    let pieces: Vec<&str> = part.split('-').collect();
    if pieces.len() != 2 {
        return Err(format!("invalid range: {part}"));
    }

    let start: u32 = pieces[0]
        .parse()
        .map_err(|_| format!("invalid range start: {}", pieces[0]))?;
    let end: u32 = pieces[1]
        .parse()
        .map_err(|_| format!("invalid range end: {}", pieces[1]))?;

    if start < min || start > max {
        return Err(format!("range start {start} out of range [{min}, {max}]"));
    }
    if end < min || end > max {
        return Err(format!("range end {end} out of range [{min}, {max}]"));
    }
    if start > end {
        return Err(format!("range start {start} greater than end {end}"));
    }

    values.extend(start..=end);
    Ok(())
}

fn parse_step(part: &str, min: u32, max: u32, values: &mut HashSet<u32>) -> Result<(), String> {
    let pieces: Vec<&str> = part.split('/').collect();
    if pieces.len() != 2 {
        return Err(format!("invalid step: {part}"));
    }

    let step: u32 = pieces[1]
        .parse()
        .map_err(|_| format!("invalid step value: {}", pieces[1]))?;
    if step == 0 {
        return Err("step must be positive".to_string());
    }

    let range_values: Vec<u32> = if pieces[0] == "*" {
        (min..=max).collect()
    } else {
        let base = parse_field(pieces[0], min, max)?;
        (min..=max).filter(|v| base.matches(*v)).collect()
    };

    values.extend(
        range_values
            .iter()
            .enumerate()
            .filter(|(i, _)| i % step as usize == 0)
            .map(|(_, v)| *v),
    );
    Ok(())
}

impl fmt::Display for CronExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            field_to_string(&self.minute, 0, 59),
            field_to_string(&self.hour, 0, 23),
            field_to_string(&self.day_of_month, 1, 31),
            field_to_string(&self.month, 1, 12),
            field_to_string(&self.day_of_week, 0, 6),
        )
    }
}

/// Render a field back in compressed form: `*` when full, single values
/// as-is, consecutive runs as `a-b` ranges.
fn field_to_string(field: &CronField, min: u32, max: u32) -> String {
    if (min..=max).all(|v| field.matches(v)) {
        return "*".to_string();
    }

    let values: Vec<u32> = (min..=max).filter(|v| field.matches(*v)).collect();
    if values.len() == 1 {
        return values[0].to_string();
    }

    let mut ranges = Vec::new();
    let mut start = values[0];
    let mut end = values[0];
    for &v in &values[1..] {
        if v == end + 1 {
            end = v;
        } else {
            ranges.push(format_run(start, end));
            start = v;
            end = v;
        }
    }
    ranges.push(format_run(start, end));

    ranges.join(",")
}

fn format_run(start: u32, end: u32) -> String {
    if start == end {
        start.to_string()
    } else {
        format!("{start}-{end}")
    }
}

#[cfg(test)]
#[path = "cron_tests.rs"]
mod tests;
