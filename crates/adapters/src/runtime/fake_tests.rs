// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn records_lifecycle_calls() {
    let runtime = FakeRuntime::new();
    runtime.add_image("repo/check:1.0.0");

    assert!(runtime.image_present("repo/check:1.0.0").await.unwrap());
    assert!(!runtime.image_present("repo/check:2.0.0").await.unwrap());

    let id = runtime
        .create(&ContainerSpec {
            image: "repo/check:1.0.0".to_string(),
            env: vec!["A=1".to_string()],
            binds: vec![],
        })
        .await
        .unwrap();
    runtime.start(&id).await.unwrap();
    assert_eq!(runtime.wait(&id).await.unwrap(), 0);
    runtime.remove(&id).await.unwrap();

    let calls = runtime.calls();
    assert!(matches!(calls[2], RuntimeCall::Create { .. }));
    assert_eq!(runtime.removed_ids(), vec![id]);
}

#[tokio::test]
async fn pull_makes_image_present() {
    let runtime = FakeRuntime::new();
    assert!(!runtime.image_present("repo/check:1.0.0").await.unwrap());
    runtime
        .pull_image("repo/check:1.0.0", Duration::from_secs(1))
        .await
        .unwrap();
    assert!(runtime.image_present("repo/check:1.0.0").await.unwrap());
}

#[tokio::test]
async fn scripted_failures_surface() {
    let runtime = FakeRuntime::new();
    runtime.fail_pulls("registry offline");
    let err = runtime
        .pull_image("repo/check:1.0.0", Duration::from_secs(1))
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::PullFailed { .. }));

    runtime.fail_creates("no space left");
    let err = runtime.create(&ContainerSpec::default()).await.unwrap_err();
    assert!(matches!(err, RuntimeError::CreateFailed(_)));
}

#[tokio::test]
async fn logs_select_streams() {
    let runtime = FakeRuntime::new();
    runtime.set_stdout(b"out");
    runtime.set_stderr(b"err");

    assert_eq!(runtime.logs("id", true, false).await.unwrap(), b"out");
    assert_eq!(runtime.logs("id", false, true).await.unwrap(), b"err");
    assert_eq!(runtime.logs("id", true, true).await.unwrap(), b"outerr");
}

#[tokio::test]
async fn read_file_returns_scripted_contents() {
    let runtime = FakeRuntime::new();
    runtime.add_file("/output/result.json", b"{}");
    assert_eq!(
        runtime.read_file("id", "/output/result.json").await.unwrap(),
        b"{}"
    );
    assert!(runtime.read_file("id", "/missing").await.is_err());
}
