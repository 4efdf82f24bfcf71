// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Image resolution: turning partial tag selectors into concrete tags.

use crate::error::ExecuteError;
use foghorn_adapters::TagLister;
use foghorn_core::{parse_reference, parse_version, resolve_selector, Selector, Version};

/// Resolve an image string to a concrete `repository:x.y.z` reference.
///
/// Full three-component tags pass through untouched. Partial selectors
/// are ranked against the repository's published tags; tags that are
/// not `x.y.z` versions are ignored.
pub async fn resolve_image<T: TagLister>(lister: &T, image: &str) -> Result<String, ExecuteError> {
    let reference = parse_reference(image)?;

    if matches!(reference.selector, Selector::Full { .. }) {
        return Ok(image.to_string());
    }

    let tags = lister.list_tags(&reference.repository).await?;
    let versions: Vec<Version> = tags.iter().filter_map(|t| parse_version(t).ok()).collect();

    match resolve_selector(reference.selector, &versions) {
        Some(version) => Ok(format!("{}:{}", reference.repository, version)),
        None => Err(ExecuteError::NoMatchingTag {
            selector: reference.tag,
            repository: reference.repository,
        }),
    }
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
