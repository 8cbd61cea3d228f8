// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use vtrec_core::Job;

fn config(dir: &std::path::Path) -> Config {
    Config::for_base_dir(dir.to_path_buf())
}

#[test]
fn first_process_becomes_leader_second_follows() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    create_layout(&config).unwrap();

    let leader = elect(&config).unwrap();
    assert!(leader.is_leader());

    // Same-process second election simulates another worker: the lock is
    // held, so it must come up as a follower.
    let follower = elect(&config).unwrap();
    assert_eq!(follower.kind(), RoleKind::Follower);

    // Releasing the leader's lock lets the next election win.
    drop(leader);
    let new_leader = elect(&config).unwrap();
    assert!(new_leader.is_leader());
}

#[test]
fn lock_file_carries_pid() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    create_layout(&config).unwrap();
    let _role = elect(&config).unwrap();

    let content = std::fs::read_to_string(&config.lock_path).unwrap();
    assert_eq!(content.trim(), std::process::id().to_string());
}

#[test]
fn layout_creates_expected_directories() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    create_layout(&config).unwrap();
    for sub in ["dataset", "streamdump", "chatarchive", "logs", "dbs"] {
        assert!(dir.path().join(sub).is_dir(), "missing {sub}");
    }
}

#[test]
fn demotion_targets_only_in_flight_rows() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    create_layout(&config).unwrap();
    let mut store = Store::open(&config.db_path).unwrap();

    let waiting = Job::builder().id("w").build();
    store.upsert_job(waiting).unwrap();

    let mut downloading = Job::builder().id("d").build();
    downloading.advance(JobStatus::Downloading);
    store.upsert_job(downloading).unwrap();

    let mut done = Job::builder().id("x").build();
    done.advance(JobStatus::Done);
    store.upsert_job(done).unwrap();

    let demoted = demote_in_flight(&mut store).unwrap();
    assert_eq!(demoted, vec!["d".to_string()]);

    let row = store.job("d").unwrap();
    assert_eq!(row.status, JobStatus::Error);
    assert_eq!(row.last_status, Some(JobStatus::Downloading));

    assert_eq!(store.job("w").unwrap().status, JobStatus::Waiting);
    assert_eq!(store.job("x").unwrap().status, JobStatus::Done);
}

#[test]
fn shutdown_removes_leader_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    create_layout(&config).unwrap();
    let role = elect(&config).unwrap();

    // Simulate a bound IPC socket file.
    std::fs::write(&config.ipc_path, b"").unwrap();

    shutdown(&config, &role);
    assert!(!config.ipc_path.exists());
    assert!(!config.lock_path.exists());
}
