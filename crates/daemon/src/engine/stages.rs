// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stage implementations: platform-dispatched download, mux, upload,
//! cleanup.

use super::EngineCtx;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use vtrec_core::{
    build_remote_path, find_cookies_file, stream_archive_folder, Clock, Job, JobStatus, Platform,
};
use vtrec_extractor::{Extraction, Extractor, ExtractorCtx, ExtractorError};
use vtrec_runner::{
    ffmpeg_classifier, is_cancel_diagnostic, is_livestream_fallback, run_collect, run_scanned,
    rclone_classifier, ytarchive_classifier, LineVerdict, RunOutcome, RunSpec, RunnerSignal,
    StreamSel,
};

/// Result of one stage.
#[derive(Debug)]
pub(crate) enum StageOutcome {
    Next,
    Fail(String),
    Cancel(String),
    Aborted,
}

/// State carried between stages of one pipeline run.
#[derive(Debug, Default)]
pub(crate) struct PipelineState {
    pub temp_path: Option<PathBuf>,
    pub artifact: Option<PathBuf>,
    pub uploaded: bool,
}

pub(crate) fn uploads_enabled<C: Clock>(ctx: &EngineCtx<C>) -> bool {
    !ctx.config.rclone_disabled && ctx.config.rclone_drive_target.is_some()
}

fn extractor_ctx<C: Clock>(ctx: &EngineCtx<C>) -> ExtractorCtx {
    ExtractorCtx {
        client: ctx.http.clone(),
        ytdlp_path: ctx.config.ytdlp_path.clone(),
        cookies_file: find_cookies_file(&ctx.config.base_dir),
    }
}

/// Watch target handed to recorders and extractors.
pub(crate) fn watch_target(job: &Job) -> String {
    let native = job.platform.native_id(&job.id);
    match job.platform {
        Platform::Youtube => format!("https://youtube.com/watch?v={native}"),
        Platform::Twitch => format!("https://twitch.tv/{}", job.channel_id),
        Platform::Twitcasting => {
            format!("https://twitcasting.tv/{}/movie/{}", job.channel_id, native)
        }
        // The Spaces extractor takes the native space id.
        Platform::Twitter => native.to_string(),
        Platform::Mildom => format!("https://www.mildom.com/{}", job.channel_id),
    }
}

fn temp_base<C: Clock>(ctx: &EngineCtx<C>, job: &Job) -> PathBuf {
    ctx.config.streamdump_dir.join(format!("{} [temp]", job.filename))
}

/// Temp path with an explicit suffix. The job filename carries dots from
/// the date prefix, so `Path::with_extension` would truncate it.
fn temp_file<C: Clock>(ctx: &EngineCtx<C>, job: &Job, ext: &str) -> PathBuf {
    ctx.config.streamdump_dir.join(format!("{} [temp].{ext}", job.filename))
}

/// Locate the temporary recording, tolerating whichever suffix the
/// recorder chose.
pub(crate) fn find_temp_file(dump_dir: &Path, filename: &str) -> Option<PathBuf> {
    let prefix = format!("{filename} [temp]");
    for ext in ["mp4", "ts", "m4a"] {
        let candidate = dump_dir.join(format!("{prefix}.{ext}"));
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    // Prefix scan recovers recordings with an unexpected suffix.
    let entries = std::fs::read_dir(dump_dir).ok()?;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(&prefix) && entry.path().is_file() {
            return Some(entry.path());
        }
    }
    None
}

/// Locate the muxed artifact for recovery resumes.
pub(crate) fn find_artifact(dump_dir: &Path, filename: &str) -> Option<PathBuf> {
    let prefix = format!("{filename} [");
    let temp_prefix = format!("{filename} [temp]");
    let entries = std::fs::read_dir(dump_dir).ok()?;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(&prefix) && !name.starts_with(&temp_prefix) && entry.path().is_file() {
            return Some(entry.path());
        }
    }
    None
}

// -------------------------------------------------------------------
// Download
// -------------------------------------------------------------------

pub(crate) async fn download<C: Clock>(
    ctx: &EngineCtx<C>,
    job: &mut Job,
    state: &mut PipelineState,
    cancel: &CancellationToken,
) -> StageOutcome {
    match job.platform {
        Platform::Youtube => download_youtube(ctx, job, state, cancel).await,
        Platform::Twitcasting | Platform::Mildom => {
            download_extracted(ctx, job, state, cancel).await
        }
        Platform::Twitter => download_space(ctx, job, state, cancel).await,
        Platform::Twitch => download_twitch(ctx, job, state, cancel).await,
    }
}

/// Supervise a scanned child while applying its mid-run signals: the
/// first announce moves the job to `downloading` (and starts chat
/// capture for YouTube), captured tokens become the resolution label.
async fn run_recorder<C: Clock>(
    ctx: &EngineCtx<C>,
    job: &mut Job,
    spec: RunSpec,
    scan: StreamSel,
    classify: impl FnMut(&str) -> LineVerdict + Send,
    with_chat: bool,
    cancel: &CancellationToken,
) -> RunOutcome {
    let (sig_tx, mut sig_rx) = mpsc::channel::<RunnerSignal>(8);
    let run = run_scanned(spec, scan, classify, Some(sig_tx), cancel.clone());
    tokio::pin!(run);

    loop {
        tokio::select! {
            outcome = &mut run => return outcome,
            signal = sig_rx.recv() => match signal {
                Some(RunnerSignal::Captured(token)) => {
                    ctx.set_resolution(job, token).await;
                }
                Some(RunnerSignal::Announced) => {
                    ctx.set_status(job, JobStatus::Downloading).await;
                    if with_chat {
                        ctx.chat.dispatch(job, None);
                    }
                }
                None => {}
            },
        }
    }
}

fn ffmpeg_spec<C: Clock>(ctx: &EngineCtx<C>, extraction: &Extraction, output: &Path, metadata_title: Option<&str>) -> RunSpec {
    let mut spec = RunSpec::new(&ctx.config.ffmpeg_path).arg("-hide_banner").arg("-y");
    if !extraction.headers.is_empty() {
        let header_blob: String = extraction
            .headers
            .iter()
            .map(|(k, v)| format!("{k}: {v}\r\n"))
            .collect();
        spec = spec.arg("-headers").arg(header_blob);
    }
    for url in &extraction.urls {
        spec = spec.arg("-i").arg(&url.url);
    }
    if let Some(title) = metadata_title {
        spec = spec.arg("-metadata").arg(format!("title={title}"));
    }
    spec.arg("-c").arg("copy").arg(output.display().to_string())
}

async fn download_youtube<C: Clock>(
    ctx: &EngineCtx<C>,
    job: &mut Job,
    state: &mut PipelineState,
    cancel: &CancellationToken,
) -> StageOutcome {
    let temp = temp_base(ctx, job);
    let mut spec = RunSpec::new(&ctx.config.ytarchive_path)
        .arg("-4")
        .arg("--wait")
        .arg("-r")
        .arg("30")
        .arg("-v")
        .arg("--newline")
        .arg("-o")
        .arg(temp.display().to_string());
    if let Some(cookies) = find_cookies_file(&ctx.config.base_dir) {
        spec = spec.arg("-c").arg(cookies.display().to_string());
    }
    spec = spec.arg(watch_target(job)).arg("best");

    tracing::info!(job_id = %job.id, "starting ytarchive");
    let outcome = run_recorder(
        ctx,
        job,
        spec,
        StreamSel::Both,
        ytarchive_classifier(),
        true,
        cancel,
    )
    .await;

    if outcome.cancelled {
        return StageOutcome::Aborted;
    }
    // A capture landing right before exit can outrun the signal channel;
    // the outcome carries every token either way.
    if job.resolution.is_none() {
        if let Some(token) = outcome.captured.last() {
            ctx.set_resolution(job, token.clone()).await;
        }
    }
    if outcome.success() {
        state.temp_path = Some(temp_file(ctx, job, "mp4"));
        return StageOutcome::Next;
    }

    let diagnostic = outcome
        .diagnostic
        .clone()
        .unwrap_or_else(|| format!("ytarchive exited with code {}", outcome.exit_code));
    if is_cancel_diagnostic(&diagnostic) {
        return StageOutcome::Cancel(diagnostic);
    }
    if is_livestream_fallback(&diagnostic) {
        tracing::warn!(job_id = %job.id, "recorder punted to the generic extractor, falling back");
        return download_youtube_fallback(ctx, job, state, cancel).await;
    }
    StageOutcome::Fail(format!("ytarchive exited with code {} ({diagnostic})", outcome.exit_code))
}

/// Fallback path: resolve the processed stream's (video, audio) pair and
/// mux it straight off the CDN with ffmpeg.
async fn download_youtube_fallback<C: Clock>(
    ctx: &EngineCtx<C>,
    job: &mut Job,
    state: &mut PipelineState,
    cancel: &CancellationToken,
) -> StageOutcome {
    let extraction = match resolve(ctx, job).await {
        Ok(extraction) => extraction,
        Err(outcome) => return outcome,
    };
    if let Some(resolution) = extraction.resolution.clone() {
        ctx.set_resolution(job, resolution).await;
    }

    let output = temp_file(ctx, job, "mp4");
    let spec = ffmpeg_spec(ctx, &extraction, &output, None);
    tracing::info!(job_id = %job.id, "starting ffmpeg fallback download");
    let outcome =
        run_recorder(ctx, job, spec, StreamSel::Stderr, ffmpeg_classifier(), true, cancel).await;

    if outcome.cancelled {
        return StageOutcome::Aborted;
    }
    if !outcome.success() {
        let diagnostic = outcome
            .diagnostic
            .unwrap_or_else(|| format!("ffmpeg exited with code {}", outcome.exit_code));
        return StageOutcome::Fail(diagnostic);
    }
    state.temp_path = Some(output);
    StageOutcome::Next
}

async fn resolve<C: Clock>(ctx: &EngineCtx<C>, job: &Job) -> Result<Extraction, StageOutcome> {
    let ex_ctx = extractor_ctx(ctx);
    let has_cookies = ex_ctx.cookies_file.is_some();
    let extractor = vtrec_extractor::for_platform(job.platform, &ex_ctx);
    match extractor.resolve(&watch_target(job)).await {
        Ok(extraction) if extraction.urls.is_empty() && extraction.stream.is_none() => {
            Err(StageOutcome::Fail("extractor returned no streams".to_string()))
        }
        Ok(extraction) => Ok(extraction),
        Err(err) if err.is_cancellation(has_cookies) => Err(StageOutcome::Cancel(err.to_string())),
        Err(ExtractorError::Empty(msg)) => Err(StageOutcome::Fail(msg)),
        Err(err) => Err(StageOutcome::Fail(err.to_string())),
    }
}

async fn download_extracted<C: Clock>(
    ctx: &EngineCtx<C>,
    job: &mut Job,
    state: &mut PipelineState,
    cancel: &CancellationToken,
) -> StageOutcome {
    if job.member_only && find_cookies_file(&ctx.config.base_dir).is_none() {
        return StageOutcome::Cancel(
            "members-only stream and no cookies file is available".to_string(),
        );
    }

    let extraction = match resolve(ctx, job).await {
        Ok(extraction) => extraction,
        Err(outcome) => return outcome,
    };
    if let Some(resolution) = extraction.resolution.clone() {
        ctx.set_resolution(job, resolution).await;
    }

    let output = temp_file(ctx, job, "mp4");
    let spec = ffmpeg_spec(ctx, &extraction, &output, None);
    tracing::info!(job_id = %job.id, platform = %job.platform, "starting ffmpeg download");
    let outcome =
        run_recorder(ctx, job, spec, StreamSel::Stderr, ffmpeg_classifier(), false, cancel).await;

    if outcome.cancelled {
        return StageOutcome::Aborted;
    }
    if !outcome.success() {
        let diagnostic = outcome
            .diagnostic
            .unwrap_or_else(|| format!("ffmpeg exited with code {}", outcome.exit_code));
        if is_cancel_diagnostic(&diagnostic) {
            return StageOutcome::Cancel(diagnostic);
        }
        return StageOutcome::Fail(diagnostic);
    }
    state.temp_path = Some(output);
    StageOutcome::Next
}

async fn download_space<C: Clock>(
    ctx: &EngineCtx<C>,
    job: &mut Job,
    state: &mut PipelineState,
    cancel: &CancellationToken,
) -> StageOutcome {
    let extraction = match resolve(ctx, job).await {
        Ok(extraction) => extraction,
        Err(outcome) => return outcome,
    };

    let output = temp_file(ctx, job, "m4a");
    let spec = ffmpeg_spec(ctx, &extraction, &output, Some(&job.title));
    tracing::info!(job_id = %job.id, "starting space audio download");
    let outcome =
        run_recorder(ctx, job, spec, StreamSel::Stderr, ffmpeg_classifier(), false, cancel).await;

    if outcome.cancelled {
        return StageOutcome::Aborted;
    }
    if !outcome.success() {
        let diagnostic = outcome
            .diagnostic
            .unwrap_or_else(|| format!("ffmpeg exited with code {}", outcome.exit_code));
        return StageOutcome::Fail(diagnostic);
    }
    state.temp_path = Some(output);
    StageOutcome::Next
}

async fn download_twitch<C: Clock>(
    ctx: &EngineCtx<C>,
    job: &mut Job,
    state: &mut PipelineState,
    cancel: &CancellationToken,
) -> StageOutcome {
    let extraction = match resolve(ctx, job).await {
        Ok(extraction) => extraction,
        Err(outcome) => return outcome,
    };
    if let Some(resolution) = extraction.resolution.clone() {
        ctx.set_resolution(job, resolution).await;
    }
    let Some(mut stream) = extraction.stream else {
        return StageOutcome::Fail("twitch extractor returned no live reader".to_string());
    };

    let output = temp_file(ctx, job, "ts");
    let mut file = match tokio::fs::File::create(&output).await {
        Ok(file) => file,
        Err(err) => return StageOutcome::Fail(format!("cannot create dump file: {err}")),
    };

    ctx.set_status(job, JobStatus::Downloading).await;
    tracing::info!(job_id = %job.id, "reading live stream");
    loop {
        if cancel.is_cancelled() {
            let _ = file.flush().await;
            return StageOutcome::Aborted;
        }
        match stream.read().await {
            // Empty read: the broadcast ended.
            Ok(bytes) if bytes.is_empty() => break,
            Ok(bytes) => {
                if let Err(err) = file.write_all(&bytes).await {
                    return StageOutcome::Fail(format!("dump write failed: {err}"));
                }
            }
            Err(err) => {
                tracing::warn!(job_id = %job.id, %err, "live read ended with error");
                break;
            }
        }
    }
    if let Err(err) = file.flush().await {
        return StageOutcome::Fail(format!("dump flush failed: {err}"));
    }
    state.temp_path = Some(output);
    StageOutcome::Next
}

// -------------------------------------------------------------------
// Mux
// -------------------------------------------------------------------

pub(crate) async fn mux<C: Clock>(ctx: &EngineCtx<C>, job: &mut Job, state: &mut PipelineState) -> StageOutcome {
    ctx.set_status(job, JobStatus::Muxing).await;

    let temp = state
        .temp_path
        .clone()
        .filter(|path| path.is_file())
        .or_else(|| find_temp_file(&ctx.config.streamdump_dir, &job.filename));
    let Some(temp) = temp else {
        return StageOutcome::Fail("no temporary recording found to mux".to_string());
    };
    state.temp_path = Some(temp.clone());

    if job.platform == Platform::Twitter {
        // Audio-only: no remux, just the final rename.
        let final_path = ctx
            .config
            .streamdump_dir
            .join(format!("{} [AAC].m4a", job.filename));
        if let Err(err) = tokio::fs::rename(&temp, &final_path).await {
            return StageOutcome::Fail(format!("rename failed: {err}"));
        }
        state.temp_path = None;
        state.artifact = Some(final_path);
        return StageOutcome::Next;
    }

    let resolution = job.resolution.clone().unwrap_or_else(|| "Unknown".to_string());
    let artifact = ctx
        .config
        .streamdump_dir
        .join(format!("{} [{} AAC].mkv", job.filename, resolution));
    let spec = RunSpec::new(&ctx.config.mkvmerge_path)
        .arg("-o")
        .arg(artifact.display().to_string())
        .arg(temp.display().to_string());

    tracing::info!(job_id = %job.id, "muxing into matroska");
    let outcome = run_collect(spec).await;
    if outcome.exit_code != 0 {
        let composed = outcome.diagnostic.unwrap_or_default();
        return StageOutcome::Fail(format!(
            "mkvmerge exited with code {}:\n{composed}",
            outcome.exit_code
        ));
    }
    state.artifact = Some(artifact);
    StageOutcome::Next
}

// -------------------------------------------------------------------
// Upload
// -------------------------------------------------------------------

pub(crate) async fn upload<C: Clock>(
    ctx: &EngineCtx<C>,
    job: &mut Job,
    state: &mut PipelineState,
) -> StageOutcome {
    ctx.set_status(job, JobStatus::Uploading).await;

    if !uploads_enabled(ctx) {
        tracing::info!(job_id = %job.id, "uploads disabled, keeping artifact on disk");
        state.uploaded = false;
        return StageOutcome::Next;
    }
    // Checked by uploads_enabled above.
    let Some(drive_target) = ctx.config.rclone_drive_target.clone() else {
        return StageOutcome::Next;
    };

    let artifact = state
        .artifact
        .clone()
        .filter(|path| path.is_file())
        .or_else(|| find_artifact(&ctx.config.streamdump_dir, &job.filename));
    let Some(artifact) = artifact else {
        return StageOutcome::Fail("no muxed artifact found to upload".to_string());
    };
    state.artifact = Some(artifact.clone());

    let segments = {
        let index = ctx.dataset.read().clone();
        index.upload_segments(&job.channel_id, job.platform)
    };
    let mut remote_segments = vec![stream_archive_folder(job.member_only).to_string()];
    remote_segments.extend(segments);
    let segment_refs: Vec<&str> = remote_segments.iter().map(String::as_str).collect();
    let target = build_remote_path(&drive_target, &segment_refs);

    tracing::info!(job_id = %job.id, %target, "uploading to drive target");
    let spec = RunSpec::new(&ctx.config.rclone_path)
        .arg("-v")
        .arg("-P")
        .arg("copy")
        .arg(artifact.display().to_string())
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
        let diagnostic = outcome
            .diagnostic
            .unwrap_or_else(|| format!("rclone exited with code {}", outcome.exit_code));
        return StageOutcome::Fail(diagnostic);
    }
    state.uploaded = true;
    StageOutcome::Next
}

// -------------------------------------------------------------------
// Clean
// -------------------------------------------------------------------

pub(crate) async fn clean<C: Clock>(
    ctx: &EngineCtx<C>,
    job: &mut Job,
    state: &mut PipelineState,
) -> StageOutcome {
    ctx.set_status(job, JobStatus::Cleaning).await;

    // Remove every temp file for this job, whatever suffix it got.
    while let Some(temp) = find_temp_file(&ctx.config.streamdump_dir, &job.filename) {
        if let Err(err) = tokio::fs::remove_file(&temp).await {
            return StageOutcome::Fail(format!("failed to remove {}: {err}", temp.display()));
        }
    }

    // The muxed artifact goes only after a successful upload.
    if state.uploaded {
        let artifact = state
            .artifact
            .clone()
            .or_else(|| find_artifact(&ctx.config.streamdump_dir, &job.filename));
        if let Some(artifact) = artifact {
            match tokio::fs::remove_file(&artifact).await {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    return StageOutcome::Fail(format!(
                        "failed to remove {}: {err}",
                        artifact.display()
                    ));
                }
            }
        }
    }
    StageOutcome::Next
}

#[cfg(test)]
#[path = "stages_tests.rs"]
mod tests;
