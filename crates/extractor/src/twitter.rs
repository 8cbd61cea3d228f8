// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Twitter Spaces extractor: guest-token flow into the AudioSpaceById
//! GraphQL query, then the live stream status endpoint.

use crate::{Extraction, ExtractedUrl, Extractor, ExtractorError};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::OnceLock;

const GUEST_BEARER: &str = "AAAAAAAAAAAAAAAAAAAAANRILgAAAAAAnNwIzUejRCOuH5E6I8xnZz4puTs=1Zv7ttfk8LF81IUq16cHjhLTvJu4FA33AGWWjCpTnA";
const AUDIO_SPACE_QUERY_ID: &str = "Uv5R_-Chxbn1FEkyUkSW2w";

#[allow(clippy::unwrap_used)] // static pattern
fn guest_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"gt=(\d{19})").unwrap())
}

/// Pull the guest token out of the twitter.com landing page.
pub(crate) fn extract_guest_token(html: &str) -> Option<String> {
    guest_token_re()
        .captures(html)
        .map(|caps| caps[1].to_string())
}

pub struct TwitterSpaceExtractor {
    client: reqwest::Client,
}

impl TwitterSpaceExtractor {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn guest_token(&self) -> Result<String, ExtractorError> {
        let html = self
            .client
            .get("https://twitter.com")
            .send()
            .await?
            .text()
            .await?;
        extract_guest_token(&html)
            .ok_or_else(|| ExtractorError::Other("no guest token in landing page".to_string()))
    }

    async fn space_media_key(&self, space_id: &str, token: &str) -> Result<String, ExtractorError> {
        let variables = json!({
            "id": space_id,
            "isMetatagsQuery": "false",
            "withReplays": "false",
            "withScheduledSpaces": "false",
        });
        let url = format!(
            "https://twitter.com/i/api/graphql/{AUDIO_SPACE_QUERY_ID}/AudioSpaceById"
        );
        let payload: Value = self
            .client
            .get(url)
            .query(&[("variables", variables.to_string())])
            .header("Authorization", format!("Bearer {GUEST_BEARER}"))
            .header("x-guest-token", token)
            .send()
            .await?
            .json()
            .await?;

        payload
            .pointer("/data/audioSpace/metadata/media_key")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ExtractorError::Empty(format!("space {space_id} has no media key")))
    }

    async fn stream_location(&self, media_key: &str, token: &str) -> Result<String, ExtractorError> {
        let url = format!("https://twitter.com/i/api/1.1/live_video_stream/status/{media_key}");
        let payload: Value = self
            .client
            .get(url)
            .header("Authorization", format!("Bearer {GUEST_BEARER}"))
            .header("x-guest-token", token)
            .send()
            .await?
            .json()
            .await?;

        payload
            .pointer("/source/location")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ExtractorError::Empty(format!("no live stream for {media_key}")))
    }
}

#[async_trait]
impl Extractor for TwitterSpaceExtractor {
    /// `target` is the native space id.
    async fn resolve(&self, target: &str) -> Result<Extraction, ExtractorError> {
        let token = self.guest_token().await?;
        let media_key = self.space_media_key(target, &token).await?;
        let location = self.stream_location(&media_key, &token).await?;
        tracing::info!(space = target, "twitter space resolved");
        Ok(Extraction {
            urls: vec![ExtractedUrl { url: location, resolution: None }],
            resolution: None,
            headers: Vec::new(),
            stream: None,
        })
    }
}
