// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    bare_remote = { "drive:", "drive:Stream Archive/Hololive/Okayu" },
    remote_name = { "drive", "drive:Stream Archive/Hololive/Okayu" },
    remote_with_dir = { "drive:vault/", "drive:vault/Stream Archive/Hololive/Okayu" },
    remote_with_dir_no_slash = { "drive:vault/archive", "drive:vault/archive/Stream Archive/Hololive/Okayu" },
)]
fn joins_onto_drive_base(base: &str, expected: &str) {
    let path = build_remote_path(base, &["Stream Archive", "Hololive", "Okayu"]);
    assert_eq!(path, expected);
}

#[test]
fn empty_segments_are_skipped() {
    assert_eq!(build_remote_path("drive:", &["a", "", "b"]), "drive:a/b");
}

#[test]
fn archive_folders_split_on_membership() {
    assert_eq!(stream_archive_folder(false), "Stream Archive");
    assert_eq!(stream_archive_folder(true), "Member-Only Stream Archive");
    assert_eq!(chat_archive_folder(false), "Chat Archive");
    assert_eq!(chat_archive_folder(true), "Member-Only Chat Archive");
}
