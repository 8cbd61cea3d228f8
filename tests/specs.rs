// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-level behavior specs: the invariants that span crates.

use std::collections::HashSet;
use vtrec_core::{AutoRule, Job, JobStatus, Platform, RuleKind, Video, VideoStatus};
use vtrec_daemon::scheduler::filter_videos;
use vtrec_daemon::{lifecycle, Config};
use vtrec_storage::Store;

fn video(id: &str, title: &str, channel: &str) -> Video {
    Video {
        id: id.to_string(),
        title: title.to_string(),
        start_time: 1_700_000_000,
        channel_id: channel.to_string(),
        org: Some("Hololive".to_string()),
        status: VideoStatus::Upcoming,
        platform: Platform::Youtube,
        is_member: false,
    }
}

#[test]
fn error_state_invariant_holds_through_store() {
    // ∀ jobs: last_status = nil ⇔ status ≠ error.
    let dir = tempfile::tempdir().unwrap();
    let mut store = Store::open(dir.path().join("vtrec.json")).unwrap();

    let mut job = Job::builder().id("inv").build();
    store.upsert_job(job.clone()).unwrap();
    assert!(store.job("inv").unwrap().last_status.is_none());

    job.fail(JobStatus::Uploading, "rclone exited with code 4");
    store.upsert_job(job.clone()).unwrap();
    let row = store.job("inv").unwrap();
    assert_eq!(row.status, JobStatus::Error);
    assert_eq!(row.last_status, Some(JobStatus::Uploading));

    job.cancel("private video");
    store.upsert_job(job).unwrap();
    let row = store.job("inv").unwrap();
    assert_eq!(row.status, JobStatus::Cancelled);
    assert!(row.last_status.is_none());
}

#[test]
fn rule_insert_then_delete_is_identity() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = Store::open(dir.path().join("vtrec.json")).unwrap();

    store
        .insert_rule(AutoRule {
            id: 0,
            kind: RuleKind::Group,
            data: "hololive".to_string(),
            include: true,
            chains: Vec::new(),
        })
        .unwrap();
    let before: Vec<String> = store.rules().iter().map(|r| r.data.clone()).collect();

    let transient = store
        .insert_rule(AutoRule {
            id: 0,
            kind: RuleKind::Word,
            data: "asmr".to_string(),
            include: false,
            chains: Vec::new(),
        })
        .unwrap();
    store.delete_rule(transient.id).unwrap();

    let after: Vec<String> = store.rules().iter().map(|r| r.data.clone()).collect();
    assert_eq!(before, after);
}

#[test]
fn autoscheduler_tick_is_idempotent_over_a_snapshot() {
    let rules = vec![AutoRule {
        id: 1,
        kind: RuleKind::Group,
        data: "hololive".to_string(),
        include: true,
        chains: Vec::new(),
    }];
    let snapshot = vec![video("a", "zatsudan", "UCa"), video("b", "karaoke", "UCb")];

    let first = filter_videos(&rules, &HashSet::new(), snapshot.clone());
    assert_eq!(first.len(), 2);

    // A completed tick inserted both ids; the same snapshot now yields
    // no new jobs.
    let existing: HashSet<String> = first.iter().map(|v| v.job_id()).collect();
    assert!(filter_videos(&rules, &existing, snapshot).is_empty());
}

#[test]
fn leader_crash_lets_follower_take_over() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::for_base_dir(dir.path().to_path_buf());
    lifecycle::create_layout(&config).unwrap();

    let leader = lifecycle::elect(&config).unwrap();
    assert!(leader.is_leader());
    let follower = lifecycle::elect(&config).unwrap();
    assert!(!follower.is_leader());

    // Leader "crashes": the lock releases, and the follower's next
    // startup wins the election.
    drop(leader);
    let promoted = lifecycle::elect(&config).unwrap();
    assert!(promoted.is_leader());
}

#[test]
fn crashed_download_is_recovered_via_demotion() {
    // Spec §8 scenario 6 with the adopted startup deviation: a row stuck
    // in `downloading` is demoted to `error` so recovery picks it up.
    let dir = tempfile::tempdir().unwrap();
    let config = Config::for_base_dir(dir.path().to_path_buf());
    lifecycle::create_layout(&config).unwrap();
    let mut store = Store::open(&config.db_path).unwrap();

    let mut job = Job::builder().id("stuck").build();
    job.advance(JobStatus::Downloading);
    store.upsert_job(job).unwrap();

    let demoted = lifecycle::demote_in_flight(&mut store).unwrap();
    assert_eq!(demoted, vec!["stuck".to_string()]);

    let row = store.job("stuck").unwrap();
    assert_eq!(row.status, JobStatus::Error);
    assert_eq!(row.last_status, Some(JobStatus::Downloading));
    // The recovery path resumes exactly where the crash happened.
    assert_eq!(row.recovery_stage(), Some(JobStatus::Downloading));
}
