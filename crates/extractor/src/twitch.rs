// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Twitch extractor: resolves the live HLS playlist and hands back a
//! streaming-open handle read in a loop to a `.ts` file.

use crate::hls::HlsLiveStream;
use crate::ytdlp::classify_failure;
use crate::{Extraction, ExtractedUrl, Extractor, ExtractorCtx, ExtractorError};
use async_trait::async_trait;
use serde::Deserialize;
use vtrec_runner::RunSpec;

#[derive(Debug, Deserialize)]
struct DumpInfo {
    #[serde(default)]
    formats: Vec<DumpFormat>,
}

#[derive(Debug, Clone, Deserialize)]
struct DumpFormat {
    url: String,
    #[serde(default)]
    format_id: Option<String>,
    #[serde(default)]
    protocol: Option<String>,
    #[serde(default)]
    height: Option<u32>,
}

/// Pick the best HLS variant, skipping the alias qualities streamlink
/// would also drop (best/worst/audio_only).
pub(crate) fn select_hls_variant(formats: &[DumpFormat]) -> Option<DumpFormat> {
    formats
        .iter()
        .filter(|f| {
            f.protocol.as_deref().is_none_or(|p| p.contains("m3u8"))
                && !matches!(
                    f.format_id.as_deref(),
                    Some("best") | Some("worst") | Some("audio_only")
                )
        })
        .max_by_key(|f| f.height.unwrap_or(0))
        .cloned()
}

pub struct TwitchExtractor {
    ctx: ExtractorCtx,
}

impl TwitchExtractor {
    pub fn new(ctx: ExtractorCtx) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Extractor for TwitchExtractor {
    async fn resolve(&self, target: &str) -> Result<Extraction, ExtractorError> {
        let mut spec = RunSpec::new(&self.ctx.ytdlp_path).arg("-J");
        if let Some(cookies) = &self.ctx.cookies_file {
            spec = spec.arg("--cookies").arg(cookies.display().to_string());
        }
        spec = spec.arg(target);

        let outcome = vtrec_runner::run_capture(spec).await;
        if outcome.exit_code != 0 {
            tracing::error!(target, exit = outcome.exit_code, "twitch resolve failed");
            return Err(classify_failure(&outcome.stderr));
        }
        let info: DumpInfo = serde_json::from_str(&outcome.stdout)
            .map_err(|err| ExtractorError::Other(format!("bad yt-dlp dump: {err}")))?;

        let variant = select_hls_variant(&info.formats)
            .ok_or_else(|| ExtractorError::Empty(format!("no streams found for {target}")))?;
        let resolution = variant
            .height
            .map(|h| format!("{h}p"))
            .or(variant.format_id.clone())
            .unwrap_or_else(|| "Unknown".to_string());

        tracing::info!(target, resolution = %resolution, "twitch stream resolved");
        let stream = HlsLiveStream::new(self.ctx.client.clone(), variant.url.clone(), Vec::new());
        Ok(Extraction {
            urls: vec![ExtractedUrl { url: variant.url, resolution: Some(resolution.clone()) }],
            resolution: Some(resolution),
            headers: Vec::new(),
            stream: Some(stream),
        })
    }
}

#[cfg(test)]
#[path = "twitch_tests.rs"]
mod tests;
