// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redaction of container output before it reaches the daemon log.
//!
//! Known secret values are replaced literally; three regex passes then
//! scrub authorization headers, common credential assignments, and
//! bearer tokens that slipped through.

use regex::Regex;
use std::sync::LazyLock;

static AUTH_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)(authorization\s*[:=]\s*)([^\r\n]+)").expect("constant regex pattern is valid")
});

static CREDENTIAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?im)("?(?:password|passwd|token|secret|api[_-]?key|authorization)"?\s*[:=]\s*)("[^"]*"|'[^']*'|[^\s,}]+)"#,
    )
    .expect("constant regex pattern is valid")
});

static BEARER_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bbearer\s+[A-Za-z0-9\-._~+/]+=*").expect("constant regex pattern is valid")
});

/// Replace known secrets and credential-shaped text with `[REDACTED]`.
pub fn redact_output(output: &str, secrets: &[String]) -> String {
    let mut redacted = output.to_string();

    let mut unique: Vec<&String> = Vec::with_capacity(secrets.len());
    for secret in secrets {
        if secret.is_empty() || unique.contains(&secret) {
            continue;
        }
        unique.push(secret);
    }
    for secret in unique {
        redacted = redacted.replace(secret.as_str(), "[REDACTED]");
    }

    let redacted = AUTH_HEADER.replace_all(&redacted, "${1}[REDACTED]");
    let redacted = CREDENTIAL.replace_all(&redacted, "${1}[REDACTED]");
    let redacted = BEARER_TOKEN.replace_all(&redacted, "Bearer [REDACTED]");
    redacted.into_owned()
}

/// Keep the tail of oversized output, marking the cut.
pub fn truncate_output(output: &str, max_chars: usize) -> String {
    if max_chars == 0 || output.len() <= max_chars {
        return output.to_string();
    }
    let mut start = output.len() - max_chars;
    while !output.is_char_boundary(start) {
        start += 1;
    }
    format!("... (truncated, showing tail)\n{}", &output[start..])
}

#[cfg(test)]
#[path = "redact_tests.rs"]
mod tests;
