// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn debug_output_mode_parses() {
    assert_eq!(DebugOutputMode::parse(""), Ok(None));
    assert_eq!(DebugOutputMode::parse("  "), Ok(None));
    assert_eq!(DebugOutputMode::parse("off"), Ok(Some(DebugOutputMode::Off)));
    assert_eq!(
        DebugOutputMode::parse("on_failure"),
        Ok(Some(DebugOutputMode::OnFailure))
    );
    assert_eq!(
        DebugOutputMode::parse("always"),
        Ok(Some(DebugOutputMode::Always))
    );
    assert!(DebugOutputMode::parse("sometimes").is_err());
}

#[test]
fn debug_output_mode_gating() {
    assert!(DebugOutputMode::Always.should_log(false));
    assert!(DebugOutputMode::Always.should_log(true));
    assert!(DebugOutputMode::OnFailure.should_log(true));
    assert!(!DebugOutputMode::OnFailure.should_log(false));
    assert!(!DebugOutputMode::Off.should_log(true));
}

#[test]
fn new_definition_defaults() {
    let check = CheckDefinition::new("web", "repo/http-check:1.0.0", Schedule::Cron("* * * * *".into()));
    assert!(check.enabled);
    assert!(check.timeout.is_none());
    assert!(check.env.is_empty());
    assert!(check.metadata.is_none());
    assert!(check.debug_output.is_none());
}
