// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Capture supervision: one task per video, pending-row bookkeeping, and
//! the crash-resume pass at startup.

use crate::client::{ChatClient, ChatOutcome};
use crate::errors::ChatError;
use crate::resume::backtrack_last_timestamp;
use crate::uploader::upload_transcript;
use crate::writer::JsonArrayWriter;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use vtrec_core::{find_cookies_file, Job, PendingChatCapture, SystemClock};
use vtrec_dataset::SharedIndex;
use vtrec_storage::Store;

/// rclone backend configuration shared with the lifecycle engine.
#[derive(Debug, Clone)]
pub struct RcloneCfg {
    pub path: PathBuf,
    pub drive_target: Option<String>,
    pub disabled: bool,
}

/// Everything a capture task needs.
#[derive(Clone)]
pub struct ChatCaptureCtx {
    pub http: reqwest::Client,
    pub base_dir: PathBuf,
    pub store: Arc<Mutex<Store>>,
    pub dataset: SharedIndex,
    pub rclone: RcloneCfg,
}

/// Dispatches and deduplicates chat captures.
pub struct ChatManager {
    ctx: ChatCaptureCtx,
    active: Arc<Mutex<HashSet<String>>>,
    cancel: CancellationToken,
}

impl ChatManager {
    pub fn new(ctx: ChatCaptureCtx, cancel: CancellationToken) -> Self {
        Self { ctx, active: Arc::new(Mutex::new(HashSet::new())), cancel }
    }

    /// Start a capture for a job unless one is already running. Returns
    /// the task handle when a capture was dispatched.
    pub fn dispatch(&self, job: &Job, resume_from: Option<i64>) -> Option<JoinHandle<()>> {
        {
            let mut active = self.active.lock();
            if !active.insert(job.id.clone()) {
                tracing::warn!(id = %job.id, "chat capture already running");
                return None;
            }
        }

        let capture = PendingChatCapture::new(
            &job.id,
            format!("{}.chat.json", job.filename),
            &job.channel_id,
            job.member_only,
        );
        let capture = match self.ctx.store.lock().ensure_chat_capture(capture) {
            Ok(capture) => capture,
            Err(err) => {
                tracing::error!(id = %job.id, %err, "failed to persist chat capture row");
                self.active.lock().remove(&job.id);
                return None;
            }
        };

        let ctx = self.ctx.clone();
        let active = Arc::clone(&self.active);
        let cancel = self.cancel.child_token();
        let video_id = job.id.clone();
        Some(tokio::spawn(async move {
            run_capture(ctx, capture, video_id.clone(), resume_from, cancel).await;
            active.lock().remove(&video_id);
        }))
    }

    /// Startup pass over surviving pending rows: finished jobs drain to
    /// upload, in-flight ones resume capture from the last timestamp.
    pub async fn resume_pending(&self) {
        let captures = self.ctx.store.lock().chat_captures();
        for capture in captures {
            let job = self.ctx.store.lock().job(&capture.id).cloned();
            match job {
                None => {
                    tracing::info!(id = %capture.id, "chat owner gone, dispatching upload");
                    upload_transcript(&self.ctx, &capture).await;
                }
                Some(job) if job.is_terminal() => {
                    tracing::info!(id = %capture.id, "chat owner finished, dispatching upload");
                    upload_transcript(&self.ctx, &capture).await;
                }
                Some(job) => {
                    let path = self.ctx.base_dir.join("chatarchive").join(&capture.filename);
                    let last = backtrack_last_timestamp(&path).await;
                    tracing::info!(
                        id = %capture.id,
                        last_timestamp = last,
                        "resuming chat capture"
                    );
                    self.dispatch(&job, last);
                }
            }
        }
    }
}

async fn run_capture(
    ctx: ChatCaptureCtx,
    capture: PendingChatCapture,
    video_id: String,
    resume_from: Option<i64>,
    cancel: CancellationToken,
) {
    let path = ctx.base_dir.join("chatarchive").join(&capture.filename);
    let mut writer = match JsonArrayWriter::open(&path, true).await {
        Ok(writer) => writer,
        Err(err) => {
            tracing::error!(id = %video_id, %err, "failed to open chat transcript");
            return;
        }
    };

    let cookies = find_cookies_file(&ctx.base_dir);
    let client = ChatClient::new(ctx.http.clone(), cookies, SystemClock).await;
    tracing::info!(id = %video_id, resume_from, "starting chat capture");

    let outcome = client.run(&video_id, &mut writer, resume_from, cancel).await;
    if let Err(err) = writer.close().await {
        tracing::warn!(id = %video_id, %err, "failed to close chat transcript");
    }

    match outcome {
        Ok(ChatOutcome::Completed) => {
            tracing::info!(id = %video_id, "chat capture finished, sending upload signal");
            upload_transcript(&ctx, &capture).await;
        }
        Ok(ChatOutcome::Cancelled) => {
            // The pending row stays so a later run resumes the capture.
            tracing::info!(id = %video_id, "chat capture cancelled, flushed");
        }
        Err(err) if err.is_retryable() => {
            tracing::warn!(id = %video_id, %err, "chat capture retryable exit");
        }
        Err(err @ (ChatError::Http(_) | ChatError::Io(_) | ChatError::Parse(_))) => {
            // Transient failure: the pending row stays so a later run
            // resumes from the last captured timestamp.
            tracing::warn!(id = %video_id, %err, "chat capture interrupted, keeping pending row");
        }
        Err(err) => {
            tracing::error!(id = %video_id, %err, "chat capture failed");
            // Typed exits are final for this broadcast; drain whatever
            // was captured.
            upload_transcript(&ctx, &capture).await;
        }
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
