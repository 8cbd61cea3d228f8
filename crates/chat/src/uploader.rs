// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transcript upload: drain a finished capture to the rclone backend and
//! retire its pending row.

use crate::manager::ChatCaptureCtx;
use tokio_util::sync::CancellationToken;
use vtrec_core::{build_remote_path, chat_archive_folder, PendingChatCapture, Platform};
use vtrec_runner::{rclone_classifier, run_scanned, RunSpec, StreamSel};

/// Upload one transcript. The pending row is deleted only after the copy
/// succeeds (or uploads are disabled); failures leave the row so a later
/// run retries.
pub async fn upload_transcript(ctx: &ChatCaptureCtx, capture: &PendingChatCapture) {
    let local = ctx.base_dir.join("chatarchive").join(&capture.filename);
    if !local.is_file() {
        tracing::warn!(id = %capture.id, "chat dump not found, dropping pending row");
        if let Err(err) = ctx.store.lock().delete_chat_capture(&capture.id) {
            tracing::error!(id = %capture.id, %err, "failed to delete chat capture row");
        }
        return;
    }

    if ctx.rclone.disabled {
        tracing::info!(id = %capture.id, "uploads disabled, keeping transcript on disk");
        if let Err(err) = ctx.store.lock().delete_chat_capture(&capture.id) {
            tracing::error!(id = %capture.id, %err, "failed to delete chat capture row");
        }
        return;
    }
    let Some(drive_target) = &ctx.rclone.drive_target else {
        tracing::warn!(id = %capture.id, "no drive target configured, keeping pending row");
        return;
    };

    let segments = {
        let index = ctx.dataset.read().clone();
        index.upload_segments(&capture.channel_id, Platform::Youtube)
    };
    let mut remote_segments = vec![chat_archive_folder(capture.member_only).to_string()];
    remote_segments.extend(segments);
    let segment_refs: Vec<&str> = remote_segments.iter().map(String::as_str).collect();
    let target = build_remote_path(drive_target, &segment_refs);

    tracing::info!(id = %capture.id, %target, "uploading chat transcript");
    let spec = RunSpec::new(&ctx.rclone.path)
        .arg("-v")
        .arg("-P")
        .arg("copy")
        .arg(local.display().to_string())
        .arg(&target);
    let outcome = run_scanned(
        spec,
        StreamSel::Both,
        rclone_classifier(),
        None,
        CancellationToken::new(),
    )
    .await;

    if outcome.exit_code != 0 {
        tracing::error!(
            id = %capture.id,
            exit = outcome.exit_code,
            diagnostic = outcome.diagnostic.as_deref().unwrap_or(""),
            "chat upload failed, keeping pending row for retry"
        );
        return;
    }

    if let Err(err) = ctx.store.lock().delete_chat_capture(&capture.id) {
        tracing::error!(id = %capture.id, %err, "failed to delete chat capture row");
        return;
    }
    if let Err(err) = tokio::fs::remove_file(&local).await {
        tracing::warn!(id = %capture.id, %err, "failed to remove uploaded transcript");
    }
    tracing::info!(id = %capture.id, "chat transcript uploaded");
}
