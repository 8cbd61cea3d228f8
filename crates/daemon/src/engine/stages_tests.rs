// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::super::test_helpers::test_ctx;
use super::*;
use vtrec_core::JobStatus;
use yare::parameterized;

#[test]
fn temp_file_prefers_known_suffixes() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("show [temp].ts"), b"x").unwrap();
    std::fs::write(dir.path().join("show [temp].mp4"), b"x").unwrap();
    let found = find_temp_file(dir.path(), "show").unwrap();
    assert_eq!(found, dir.path().join("show [temp].mp4"));
}

#[test]
fn temp_file_prefix_scan_recovers_odd_suffix() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("show [temp].mkv.part"), b"x").unwrap();
    let found = find_temp_file(dir.path(), "show").unwrap();
    assert_eq!(found, dir.path().join("show [temp].mkv.part"));

    assert!(find_temp_file(dir.path(), "other").is_none());
}

#[test]
fn artifact_scan_skips_temp_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("show [temp].mp4"), b"x").unwrap();
    std::fs::write(dir.path().join("show [1080p60 AAC].mkv"), b"x").unwrap();
    let found = find_artifact(dir.path(), "show").unwrap();
    assert_eq!(found, dir.path().join("show [1080p60 AAC].mkv"));
}

#[parameterized(
    youtube = { "abc123", "https://youtube.com/watch?v=abc123" },
    twitcasting = { "twcast-991", "https://twitcasting.tv/caster/movie/991" },
    twitch = { "ttv-vod-5", "https://twitch.tv/caster" },
    mildom = { "mildom-10", "https://www.mildom.com/caster" },
    space = { "twtsp-1OdK", "1OdK" },
)]
fn watch_targets(job_id: &str, expected: &str) {
    let job = vtrec_core::Job::new(job_id, "t", "f", 0, "caster", false);
    assert_eq!(watch_target(&job), expected);
}

#[tokio::test]
async fn mux_without_temp_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (ctx, _clock, _rx) = test_ctx(dir.path());
    let mut job = vtrec_core::Job::builder().build();
    ctx.store.lock().upsert_job(job.clone()).unwrap();

    let mut state = PipelineState::default();
    let outcome = mux(&ctx, &mut job, &mut state).await;
    assert!(matches!(outcome, StageOutcome::Fail(msg) if msg.contains("no temporary recording")));
    assert_eq!(job.status, JobStatus::Muxing);
}

#[tokio::test]
async fn mux_missing_binary_is_recoverable_failure() {
    let dir = tempfile::tempdir().unwrap();
    let (ctx, _clock, _rx) = test_ctx(dir.path());
    let mut job = vtrec_core::Job::builder().resolution("720p").build();
    ctx.store.lock().upsert_job(job.clone()).unwrap();

    let temp = ctx.config.streamdump_dir.join(format!("{} [temp].mp4", job.filename));
    std::fs::write(&temp, b"fake recording").unwrap();

    let mut state = PipelineState { temp_path: Some(temp), ..Default::default() };
    let outcome = mux(&ctx, &mut job, &mut state).await;
    // mkvmerge path points nowhere in tests: spawn blocked, code -100.
    assert!(matches!(outcome, StageOutcome::Fail(msg) if msg.contains("-100")));
}

#[tokio::test]
async fn mux_renames_space_audio() {
    let dir = tempfile::tempdir().unwrap();
    let (ctx, _clock, _rx) = test_ctx(dir.path());
    let mut job = vtrec_core::Job::builder().id("twtsp-1OdK").build();
    ctx.store.lock().upsert_job(job.clone()).unwrap();

    let temp = ctx.config.streamdump_dir.join(format!("{} [temp].m4a", job.filename));
    std::fs::write(&temp, b"audio").unwrap();

    let mut state = PipelineState { temp_path: Some(temp.clone()), ..Default::default() };
    let outcome = mux(&ctx, &mut job, &mut state).await;
    assert!(matches!(outcome, StageOutcome::Next));

    let expected = ctx.config.streamdump_dir.join(format!("{} [AAC].m4a", job.filename));
    assert!(expected.is_file());
    assert!(!temp.exists());
    assert_eq!(state.artifact, Some(expected));
}

#[tokio::test]
async fn upload_skips_when_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let (ctx, _clock, _rx) = test_ctx(dir.path());
    let mut job = vtrec_core::Job::builder().build();
    ctx.store.lock().upsert_job(job.clone()).unwrap();

    let mut state = PipelineState::default();
    let outcome = upload(&ctx, &mut job, &mut state).await;
    assert!(matches!(outcome, StageOutcome::Next));
    assert!(!state.uploaded);
    assert_eq!(job.status, JobStatus::Uploading);
}

#[tokio::test]
async fn clean_removes_temps_keeps_unuploaded_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let (ctx, _clock, _rx) = test_ctx(dir.path());
    let mut job = vtrec_core::Job::builder().build();
    ctx.store.lock().upsert_job(job.clone()).unwrap();

    let temp = ctx.config.streamdump_dir.join(format!("{} [temp].mp4", job.filename));
    let artifact = ctx
        .config
        .streamdump_dir
        .join(format!("{} [720p AAC].mkv", job.filename));
    std::fs::write(&temp, b"t").unwrap();
    std::fs::write(&artifact, b"a").unwrap();

    let mut state = PipelineState {
        temp_path: Some(temp.clone()),
        artifact: Some(artifact.clone()),
        uploaded: false,
    };
    let outcome = clean(&ctx, &mut job, &mut state).await;
    assert!(matches!(outcome, StageOutcome::Next));
    assert!(!temp.exists());
    // Upload never ran: the muxed artifact survives.
    assert!(artifact.is_file());
}

#[tokio::test]
async fn clean_removes_artifact_after_upload() {
    let dir = tempfile::tempdir().unwrap();
    let (ctx, _clock, _rx) = test_ctx(dir.path());
    let mut job = vtrec_core::Job::builder().build();
    ctx.store.lock().upsert_job(job.clone()).unwrap();

    let artifact = ctx
        .config
        .streamdump_dir
        .join(format!("{} [720p AAC].mkv", job.filename));
    std::fs::write(&artifact, b"a").unwrap();

    let mut state = PipelineState {
        temp_path: None,
        artifact: Some(artifact.clone()),
        uploaded: true,
    };
    let outcome = clean(&ctx, &mut job, &mut state).await;
    assert!(matches!(outcome, StageOutcome::Next));
    assert!(!artifact.exists());
}
