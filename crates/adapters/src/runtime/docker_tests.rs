// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn tar_with(contents: &[u8]) -> Vec<u8> {
    // Minimal ustar-ish single-entry archive: 512-byte header with the
    // size field at offset 124, contents padded to a block, two
    // trailing zero blocks.
    let mut header = vec![0u8; 512];
    header[..11].copy_from_slice(b"result.json");
    let size = format!("{:011o}\0", contents.len());
    header[124..124 + size.len()].copy_from_slice(size.as_bytes());

    let mut data = header;
    data.extend_from_slice(contents);
    let pad = (512 - contents.len() % 512) % 512;
    data.extend(std::iter::repeat(0).take(pad));
    data.extend(std::iter::repeat(0).take(1024));
    data
}

#[test]
fn extracts_first_tar_entry() {
    let payload = br#"{"status":"pass"}"#;
    let data = tar_with(payload);
    assert_eq!(first_tar_entry(&data), Some(payload.to_vec()));
}

#[test]
fn extracts_empty_entry() {
    let data = tar_with(b"");
    assert_eq!(first_tar_entry(&data), Some(Vec::new()));
}

#[test]
fn rejects_truncated_stream() {
    let payload = b"0123456789";
    let mut data = tar_with(payload);
    data.truncate(515);
    assert_eq!(first_tar_entry(&data), None);
    assert_eq!(first_tar_entry(b"short"), None);
}

#[test]
fn rejects_garbage_size_field() {
    let mut data = tar_with(b"x");
    for b in &mut data[124..136] {
        *b = b'z';
    }
    assert_eq!(first_tar_entry(&data), None);
}
