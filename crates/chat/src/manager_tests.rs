// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

fn test_ctx(dir: &std::path::Path) -> ChatCaptureCtx {
    let store = Store::open(dir.join("dbs").join("vtrec.json")).unwrap();
    ChatCaptureCtx {
        http: reqwest::Client::new(),
        base_dir: dir.to_path_buf(),
        store: Arc::new(Mutex::new(store)),
        dataset: vtrec_dataset::shared(vtrec_dataset::DatasetIndex::default()),
        rclone: RcloneCfg { path: "/usr/bin/rclone".into(), drive_target: None, disabled: true },
    }
}

#[tokio::test]
async fn dispatch_creates_pending_row_and_dedupes() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_ctx(dir.path());
    let manager = ChatManager::new(ctx.clone(), CancellationToken::new());

    let job = Job::builder().id("abc123").build();
    let handle = manager.dispatch(&job, None);
    assert!(handle.is_some());

    // The pending row exists as soon as the capture is dispatched.
    let capture = ctx.store.lock().chat_capture("abc123").cloned().unwrap();
    assert!(capture.filename.ends_with(".chat.json"));

    // A second dispatch for the same job is refused.
    assert!(manager.dispatch(&job, None).is_none());

    if let Some(handle) = handle {
        handle.abort();
    }
}

#[tokio::test]
async fn resume_pending_uploads_when_owner_gone() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_ctx(dir.path());

    // A surviving row without a matching job row: the crash marker case
    // where the job was deleted. With uploads disabled, the pass retires
    // the row and keeps the transcript.
    let capture = PendingChatCapture::new("ghost", "ghost.chat.json", "UCchan", false);
    ctx.store.lock().ensure_chat_capture(capture).unwrap();
    std::fs::create_dir_all(dir.path().join("chatarchive")).unwrap();
    std::fs::write(
        dir.path().join("chatarchive").join("ghost.chat.json"),
        json!([{"id": "m1", "timestamp": 5}]).to_string(),
    )
    .unwrap();

    let manager = ChatManager::new(ctx.clone(), CancellationToken::new());
    manager.resume_pending().await;

    assert!(ctx.store.lock().chat_capture("ghost").is_none());
    assert!(dir.path().join("chatarchive").join("ghost.chat.json").exists());
}

#[tokio::test]
async fn missing_transcript_drops_row() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_ctx(dir.path());
    let capture = PendingChatCapture::new("lost", "lost.chat.json", "UCchan", false);
    ctx.store.lock().ensure_chat_capture(capture.clone()).unwrap();

    upload_transcript(&ctx, &capture).await;
    assert!(ctx.store.lock().chat_capture("lost").is_none());
}
