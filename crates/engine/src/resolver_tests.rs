// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::error::ExecuteError;
use foghorn_adapters::FakeTagLister;
use foghorn_core::ImageError;

#[tokio::test]
async fn major_selector_resolves_to_highest_matching_tag() {
    let lister = FakeTagLister::new();
    lister.add_tags("repo/check", &["1.0.0", "1.2.0", "1.1.3", "bad-tag", "2.0.0"]);

    let resolved = resolve_image(&lister, "repo/check:1").await.unwrap();
    assert_eq!(resolved, "repo/check:1.2.0");
}

#[tokio::test]
async fn full_selector_passes_through_without_listing() {
    let lister = FakeTagLister::new();
    let resolved = resolve_image(&lister, "repo/check:1.3.0").await.unwrap();
    assert_eq!(resolved, "repo/check:1.3.0");
    assert!(lister.requests().is_empty());
}

#[tokio::test]
async fn major_patch_selector_matches_major_and_patch() {
    let lister = FakeTagLister::new();
    lister.add_tags("repo/check", &["1.0.2", "1.4.2", "1.1.1"]);

    let resolved = resolve_image(&lister, "repo/check:1.2").await.unwrap();
    assert_eq!(resolved, "repo/check:1.4.2");
}

#[tokio::test]
async fn no_matching_tag_is_an_error() {
    let lister = FakeTagLister::new();
    lister.add_tags("repo/check", &["2.0.0", "also-not-semver"]);

    let err = resolve_image(&lister, "repo/check:1").await.unwrap_err();
    assert!(matches!(
        err,
        ExecuteError::NoMatchingTag { ref selector, ref repository }
            if selector == "1" && repository == "repo/check"
    ));
}

#[tokio::test]
async fn registry_errors_propagate() {
    let lister = FakeTagLister::new();
    lister.fail_with_status("repo/check", 500);

    let err = resolve_image(&lister, "repo/check:1").await.unwrap_err();
    assert!(matches!(err, ExecuteError::Registry(_)));
}

#[tokio::test]
async fn invalid_references_are_rejected_before_listing() {
    let lister = FakeTagLister::new();
    let err = resolve_image(&lister, "repo/check:latest").await.unwrap_err();
    assert!(matches!(err, ExecuteError::Image(ImageError::LatestTag)));
    assert!(lister.requests().is_empty());
}
