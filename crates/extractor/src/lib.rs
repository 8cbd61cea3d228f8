// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! vtrec-extractor: per-platform resolvers from a watch target to
//! recordable stream URLs.

mod hls;
mod twitch;
mod twitter;
mod ytdlp;

pub use hls::HlsLiveStream;
pub use twitch::TwitchExtractor;
pub use twitter::TwitterSpaceExtractor;
pub use ytdlp::{PairSelection, YtDlpExtractor};

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;
use vtrec_core::Platform;

/// Extractor errors, classified for the lifecycle engine's cancel-vs-retry
/// decision.
#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("stream is geo-restricted: {0}")]
    GeoRestricted(String),

    #[error("login, captcha, or private stream: {0}")]
    LoginRequired(String),

    #[error("members-only stream: {0}")]
    MembersOnly(String),

    #[error("no streams available: {0}")]
    Empty(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("extractor failure: {0}")]
    Other(String),
}

impl ExtractorError {
    /// Whether this failure terminates the job as cancelled. Members-only
    /// cancels only when no cookie credential is available; with cookies
    /// it is retried.
    pub fn is_cancellation(&self, has_cookies: bool) -> bool {
        match self {
            ExtractorError::GeoRestricted(_) | ExtractorError::LoginRequired(_) => true,
            ExtractorError::MembersOnly(_) => !has_cookies,
            _ => false,
        }
    }
}

/// One resolved stream URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedUrl {
    pub url: String,
    pub resolution: Option<String>,
}

/// Result of a successful extraction.
pub struct Extraction {
    pub urls: Vec<ExtractedUrl>,
    /// Quality label for the job row (`1080p`, `XXXp`, …).
    pub resolution: Option<String>,
    /// Extra request headers the downloader must send.
    pub headers: Vec<(String, String)>,
    /// Live byte-stream handle for platforms read in a loop (Twitch).
    pub stream: Option<HlsLiveStream>,
}

impl std::fmt::Debug for Extraction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extraction")
            .field("urls", &self.urls)
            .field("resolution", &self.resolution)
            .field("headers", &self.headers)
            .field("stream", &self.stream.is_some())
            .finish()
    }
}

/// A platform resolver.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Resolve a watch URL (or native id for Spaces) into stream URLs.
    async fn resolve(&self, target: &str) -> Result<Extraction, ExtractorError>;
}

/// Shared context handed to every extractor.
#[derive(Debug, Clone)]
pub struct ExtractorCtx {
    pub client: reqwest::Client,
    pub ytdlp_path: PathBuf,
    pub cookies_file: Option<PathBuf>,
}

/// Table-driven dispatch keyed on the platform discriminant.
pub fn for_platform(platform: Platform, ctx: &ExtractorCtx) -> Box<dyn Extractor> {
    match platform {
        // The generic extractor doubles as the YouTube fallback.
        Platform::Youtube => Box::new(YtDlpExtractor::new(ctx.clone(), PairSelection::VideoAudio)),
        Platform::Twitcasting => Box::new(
            YtDlpExtractor::new(ctx.clone(), PairSelection::SingleBest)
                // The twitcasting recorder does not report a resolution.
                .with_fixed_resolution("XXXp"),
        ),
        Platform::Mildom => Box::new(YtDlpExtractor::new(ctx.clone(), PairSelection::SingleBest)),
        Platform::Twitter => Box::new(TwitterSpaceExtractor::new(ctx.client.clone())),
        Platform::Twitch => Box::new(TwitchExtractor::new(ctx.clone())),
    }
}
