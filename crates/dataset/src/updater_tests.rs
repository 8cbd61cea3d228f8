// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn hash_is_stable_over_content() {
    let a = DatasetUpdater::hash_files(&[b"hololive".to_vec(), b"nijisanji".to_vec()]);
    let b = DatasetUpdater::hash_files(&[b"hololive".to_vec(), b"nijisanji".to_vec()]);
    assert_eq!(a, b);
    assert_eq!(a.len(), 32);

    let c = DatasetUpdater::hash_files(&[b"hololive".to_vec()]);
    assert_ne!(a, c);
}

#[test]
fn local_hash_reads_first_line() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("currentversion"), "abc123def\nsecond line\n").unwrap();
    let updater = DatasetUpdater::new(
        UpdaterConfig::new(dir.path().to_path_buf()),
        reqwest::Client::new(),
    );
    assert_eq!(updater.local_hash().as_deref(), Some("abc123def"));
}

#[test]
fn local_hash_missing_file_is_none() {
    let dir = tempfile::tempdir().unwrap();
    let updater = DatasetUpdater::new(
        UpdaterConfig::new(dir.path().to_path_buf()),
        reqwest::Client::new(),
    );
    assert!(updater.local_hash().is_none());
}
