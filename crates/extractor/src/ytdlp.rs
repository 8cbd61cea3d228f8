// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Generic extractor wrapping the yt-dlp binary's JSON dump mode.
//!
//! Used directly for twitcasting and mildom and as the YouTube fallback
//! when the primary recorder reports the livestream-processed marker.

use crate::{Extraction, ExtractedUrl, Extractor, ExtractorCtx, ExtractorError};
use async_trait::async_trait;
use serde::Deserialize;
use vtrec_runner::RunSpec;

#[derive(Debug, Deserialize)]
struct DumpInfo {
    #[serde(default)]
    formats: Vec<DumpFormat>,
    #[serde(default)]
    requested_formats: Option<Vec<DumpFormat>>,
}

#[derive(Debug, Clone, Deserialize)]
struct DumpFormat {
    url: String,
    #[serde(default)]
    vcodec: Option<String>,
    #[serde(default)]
    acodec: Option<String>,
    #[serde(default)]
    ext: Option<String>,
    #[serde(default)]
    height: Option<u32>,
}

impl DumpFormat {
    fn has_video(&self) -> bool {
        self.vcodec.as_deref().is_some_and(|c| c != "none")
    }

    fn has_audio(&self) -> bool {
        self.acodec.as_deref().is_some_and(|c| c != "none")
    }
}

/// How formats are selected from the dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairSelection {
    /// Best separate video + audio pair (muxed later by ffmpeg).
    VideoAudio,
    /// Best single format carrying both streams.
    SingleBest,
}

/// Classify a yt-dlp failure from its stderr text.
pub(crate) fn classify_failure(stderr: &str) -> ExtractorError {
    let lower = stderr.to_lowercase();
    if lower.contains("geo restricted") || lower.contains("geo-restricted") {
        ExtractorError::GeoRestricted(stderr.to_string())
    } else if lower.contains("captcha") || lower.contains("private video") {
        ExtractorError::LoginRequired(stderr.to_string())
    } else if lower.contains("no video formats") || lower.contains("members only") {
        ExtractorError::MembersOnly(stderr.to_string())
    } else {
        ExtractorError::Other(stderr.to_string())
    }
}

/// Pick the best mp4 video-only format plus the matching m4a audio-only
/// format. Formats arrive sorted worst to best.
pub(crate) fn select_video_audio(formats: &[DumpFormat]) -> Option<(DumpFormat, DumpFormat)> {
    let video = formats
        .iter()
        .rev()
        .find(|f| f.has_video() && !f.has_audio() && f.ext.as_deref() == Some("mp4"))?;
    let audio_ext = match video.ext.as_deref() {
        Some("webm") => "webm",
        _ => "m4a",
    };
    let audio = formats
        .iter()
        .rev()
        .find(|f| f.has_audio() && !f.has_video() && f.ext.as_deref() == Some(audio_ext))?;
    Some((video.clone(), audio.clone()))
}

/// Pick the combined format with the greatest height.
pub(crate) fn select_single_best(formats: &[DumpFormat]) -> Option<DumpFormat> {
    formats
        .iter()
        .filter(|f| f.has_video() && f.has_audio())
        .max_by_key(|f| f.height.unwrap_or(0))
        .cloned()
}

pub struct YtDlpExtractor {
    ctx: ExtractorCtx,
    selection: PairSelection,
    fixed_resolution: Option<String>,
}

impl YtDlpExtractor {
    pub fn new(ctx: ExtractorCtx, selection: PairSelection) -> Self {
        Self { ctx, selection, fixed_resolution: None }
    }

    /// Report a fixed resolution label regardless of the dump contents.
    pub fn with_fixed_resolution(mut self, label: impl Into<String>) -> Self {
        self.fixed_resolution = Some(label.into());
        self
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    async fn resolve(&self, target: &str) -> Result<Extraction, ExtractorError> {
        let mut spec = RunSpec::new(&self.ctx.ytdlp_path).arg("-J").arg("--live-from-start");
        if let Some(cookies) = &self.ctx.cookies_file {
            spec = spec.arg("--cookies").arg(cookies.display().to_string());
        }
        spec = spec.arg(target);

        let outcome = vtrec_runner::run_capture(spec).await;
        if outcome.exit_code != 0 {
            tracing::error!(target, exit = outcome.exit_code, "yt-dlp dump failed");
            return Err(classify_failure(&outcome.stderr));
        }

        let info: DumpInfo = serde_json::from_str(&outcome.stdout)
            .map_err(|err| ExtractorError::Other(format!("bad yt-dlp dump: {err}")))?;

        // Prefer the formats yt-dlp already requested, else the raw list.
        let formats = info.requested_formats.unwrap_or(info.formats);
        if formats.is_empty() {
            return Err(ExtractorError::Empty(format!("no valid formats found for {target}")));
        }

        let (urls, resolution) = match self.selection {
            PairSelection::VideoAudio => {
                let (video, audio) = select_video_audio(&formats)
                    .ok_or_else(|| ExtractorError::Empty(format!("no valid formats found for {target}")))?;
                let resolution = video.height.map(|h| format!("{h}p"));
                (
                    vec![
                        ExtractedUrl { url: video.url, resolution: resolution.clone() },
                        ExtractedUrl { url: audio.url, resolution: None },
                    ],
                    resolution,
                )
            }
            PairSelection::SingleBest => {
                let best = select_single_best(&formats)
                    .ok_or_else(|| ExtractorError::Empty(format!("no valid formats found for {target}")))?;
                let resolution = best.height.map(|h| format!("{h}p"));
                (vec![ExtractedUrl { url: best.url, resolution: resolution.clone() }], resolution)
            }
        };

        let resolution = self.fixed_resolution.clone().or(resolution);
        Ok(Extraction { urls, resolution, headers: Vec::new(), stream: None })
    }
}

#[cfg(test)]
#[path = "ytdlp_tests.rs"]
mod tests;
