// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fs;

use tempfile::tempdir;

use crate::codec::{pack, unpack};

#[test]
fn round_trip_preserves_file_contents_and_nested_directories() {
    let src = tempdir().unwrap();
    fs::create_dir_all(src.path().join("nested/dir")).unwrap();
    fs::write(src.path().join("in.txt"), b"A").unwrap();
    fs::write(src.path().join("nested/dir/deep.txt"), b"deep-contents").unwrap();

    let archive = pack(src.path()).unwrap();

    let dest = tempdir().unwrap();
    unpack(&archive, dest.path()).unwrap();

    assert_eq!(
        fs::read_to_string(dest.path().join("in.txt")).unwrap(),
        "A"
    );
    assert_eq!(
        fs::read_to_string(dest.path().join("nested/dir/deep.txt")).unwrap(),
        "deep-contents"
    );
}

#[test]
fn unpack_into_nonexistent_directory_is_rejected() {
    let src = tempdir().unwrap();
    fs::write(src.path().join("a.txt"), b"x").unwrap();
    let archive = pack(src.path()).unwrap();

    let missing = src.path().join("does-not-exist");
    let err = unpack(&archive, &missing);
    assert!(err.is_err());
}

#[cfg(unix)]
#[test]
fn round_trip_preserves_executable_mode() {
    use std::os::unix::fs::PermissionsExt;

    let src = tempdir().unwrap();
    let script = src.path().join("run.sh");
    fs::write(&script, b"#!/bin/sh\necho hi\n").unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

    let archive = pack(src.path()).unwrap();
    let dest = tempdir().unwrap();
    unpack(&archive, dest.path()).unwrap();

    let mode = fs::metadata(dest.path().join("run.sh"))
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o111, 0o111);
}

/// A second unpack of the same archive into a fresh directory yields the
/// same tree as the first — packing is deterministic over file contents.
#[test]
fn unpack_is_idempotent_across_fresh_destinations() {
    let src = tempdir().unwrap();
    fs::write(src.path().join("in.txt"), b"A").unwrap();
    let archive = pack(src.path()).unwrap();

    let dest1 = tempdir().unwrap();
    let dest2 = tempdir().unwrap();
    unpack(&archive, dest1.path()).unwrap();
    unpack(&archive, dest2.path()).unwrap();

    assert_eq!(
        fs::read(dest1.path().join("in.txt")).unwrap(),
        fs::read(dest2.path().join("in.txt")).unwrap(),
    );
}
