// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use base64::Engine as _;
use serial_test::serial;
use tempfile::tempdir;

fn master_key() -> Vec<u8> {
    b"0123456789abcdef0123456789abcdef".to_vec()
}

#[test]
fn set_resolve_round_trip() {
    let dir = tempdir().unwrap();
    let store = SecretStore::new(dir.path().join("secrets.enc"), master_key()).unwrap();

    store.set("smtp/password", "hunter2").unwrap();
    assert_eq!(store.resolve("secret://smtp/password").unwrap(), "hunter2");
}

#[test]
fn salt_persists_across_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("secrets.enc");

    let store = SecretStore::new(&path, master_key()).unwrap();
    store.set("api/token", "abc123").unwrap();
    drop(store);

    // A brand-new handle with the same master key must decrypt what
    // the first one wrote.
    let reopened = SecretStore::new(&path, master_key()).unwrap();
    assert_eq!(reopened.resolve("secret://api/token").unwrap(), "abc123");
}

#[test]
fn wrong_master_key_fails_decryption() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("secrets.enc");

    let store = SecretStore::new(&path, master_key()).unwrap();
    store.set("k", "v").unwrap();

    let other = SecretStore::new(&path, b"ffffffffffffffffffffffffffffffff".to_vec()).unwrap();
    assert!(matches!(
        other.resolve("secret://k"),
        Err(SecretError::DecryptFailed)
    ));
}

#[test]
fn rewrites_use_fresh_nonce_but_same_salt() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("secrets.enc");
    let store = SecretStore::new(&path, master_key()).unwrap();

    store.set("a", "1").unwrap();
    let first: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    store.set("b", "2").unwrap();
    let second: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();

    assert_eq!(first["version"], 1);
    assert_eq!(first["salt"], second["salt"]);
    assert_ne!(first["nonce"], second["nonce"]);
}

#[test]
fn delete_reports_whether_key_existed() {
    let dir = tempdir().unwrap();
    let store = SecretStore::new(dir.path().join("secrets.enc"), master_key()).unwrap();

    store.set("k", "v").unwrap();
    assert!(store.delete("k").unwrap());
    assert!(!store.delete("k").unwrap());
    assert!(matches!(
        store.resolve("secret://k"),
        Err(SecretError::NotFound(_))
    ));
}

#[test]
fn list_keys_is_sorted() {
    let dir = tempdir().unwrap();
    let store = SecretStore::new(dir.path().join("secrets.enc"), master_key()).unwrap();

    store.set("zeta", "1").unwrap();
    store.set("alpha", "2").unwrap();
    store.set("mid/key", "3").unwrap();

    assert_eq!(store.list_keys().unwrap(), vec!["alpha", "mid/key", "zeta"]);
}

#[test]
fn missing_store_file_reads_as_empty() {
    let dir = tempdir().unwrap();
    let store = SecretStore::new(dir.path().join("absent.enc"), master_key()).unwrap();
    assert!(store.list_keys().unwrap().is_empty());
    assert!(matches!(
        store.resolve("secret://anything"),
        Err(SecretError::NotFound(_))
    ));
}

#[test]
fn key_validation() {
    let dir = tempdir().unwrap();
    let store = SecretStore::new(dir.path().join("secrets.enc"), master_key()).unwrap();

    assert!(matches!(store.set("", "v"), Err(SecretError::EmptyKey)));
    assert!(matches!(store.set("  ", "v"), Err(SecretError::EmptyKey)));
    assert!(matches!(
        store.set("a/../b", "v"),
        Err(SecretError::KeyTraversal)
    ));
    assert!(matches!(
        store.set("/etc/shadow", "v"),
        Err(SecretError::KeyAbsolute)
    ));
}

#[test]
fn value_size_cap() {
    let dir = tempdir().unwrap();
    let store = SecretStore::new(dir.path().join("secrets.enc"), master_key()).unwrap();

    let max = "x".repeat(64 * 1024);
    store.set("big", &max).unwrap();
    assert_eq!(store.resolve("secret://big").unwrap(), max);

    let too_big = "x".repeat(64 * 1024 + 1);
    assert!(matches!(
        store.set("bigger", &too_big),
        Err(SecretError::ValueTooLarge)
    ));
}

#[test]
fn parse_secret_ref_extracts_keys() {
    assert_eq!(parse_secret_ref("secret://smtp/password"), Some("smtp/password"));
    assert_eq!(parse_secret_ref("secret:// padded "), Some("padded"));
    assert_eq!(parse_secret_ref("secret://"), None);
    assert_eq!(parse_secret_ref("literal-value"), None);
    assert_eq!(parse_secret_ref("SECRET://upper"), None);
}

#[cfg(unix)]
#[test]
fn store_file_is_private() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("secrets.enc");
    let store = SecretStore::new(&path, master_key()).unwrap();
    store.set("k", "v").unwrap();

    let file_mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(file_mode & 0o777, 0o600);
    let dir_mode = std::fs::metadata(path.parent().unwrap())
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(dir_mode & 0o777, 0o700);
}

#[test]
fn constructor_validation() {
    assert!(matches!(
        SecretStore::new("", master_key()),
        Err(SecretError::EmptyPath)
    ));
    let dir = tempdir().unwrap();
    assert!(matches!(
        SecretStore::new(dir.path().join("s.enc"), Vec::new()),
        Err(SecretError::MissingMasterKey)
    ));
}

#[test]
#[serial]
fn master_key_from_env_prefers_base64() {
    // 48 raw bytes, base64-encoded.
    let raw = vec![7u8; 48];
    std::env::set_var(MASTER_KEY_ENV, BASE64.encode(&raw));
    assert_eq!(master_key_from_env().unwrap(), raw);

    // Not valid base64: used literally.
    std::env::set_var(MASTER_KEY_ENV, "this-is-not-base64!-but-long-enough-to-use");
    assert_eq!(
        master_key_from_env().unwrap(),
        b"this-is-not-base64!-but-long-enough-to-use".to_vec()
    );

    std::env::remove_var(MASTER_KEY_ENV);
}

#[test]
#[serial]
fn master_key_from_env_rejects_missing_or_short() {
    std::env::remove_var(MASTER_KEY_ENV);
    assert!(matches!(
        master_key_from_env(),
        Err(SecretError::MasterKeyEnvMissing)
    ));

    std::env::set_var(MASTER_KEY_ENV, "short");
    assert!(matches!(
        master_key_from_env(),
        Err(SecretError::MasterKeyTooShort)
    ));
    std::env::remove_var(MASTER_KEY_ENV);
}
