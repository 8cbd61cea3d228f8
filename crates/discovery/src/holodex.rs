// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Holodex REST client.

use crate::DiscoveryError;
use chrono::DateTime;
use serde::Deserialize;
use vtrec_core::{Platform, Video, VideoStatus};

const BASE: &str = "https://holodex.net/api/v2";
const PAGE_LIMIT: usize = 50;

/// Raw video payload as Holodex returns it.
#[derive(Debug, Deserialize)]
pub(crate) struct HolodexVideo {
    id: String,
    title: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    status: Option<String>,
    start_actual: Option<String>,
    start_scheduled: Option<String>,
    channel_id: Option<String>,
    channel: Option<HolodexChannel>,
    topic_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HolodexChannel {
    id: Option<String>,
    org: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaginatedVideos {
    #[serde(default)]
    total: serde_json::Value,
    #[serde(default)]
    items: Vec<HolodexVideo>,
}

fn date_to_unix(date: Option<&str>) -> Option<i64> {
    let parsed = DateTime::parse_from_rfc3339(date?).ok()?;
    Some(parsed.timestamp())
}

fn coerce_total(value: &serde_json::Value) -> usize {
    match value {
        serde_json::Value::Number(n) => n.as_u64().unwrap_or(0) as usize,
        serde_json::Value::String(s) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

/// Normalize one Holodex payload into a [`Video`]. Non-stream types and
/// upstream-missing videos are rejected.
pub(crate) fn coerce_video(payload: HolodexVideo) -> Option<Video> {
    if payload.kind.as_deref() != Some("stream") {
        return None;
    }
    let status = match payload.status.as_deref() {
        Some("live") => VideoStatus::Live,
        Some("upcoming") => VideoStatus::Upcoming,
        Some("past") => VideoStatus::Past,
        Some("missing") | None => return None,
        Some(other) => {
            tracing::debug!(status = other, id = %payload.id, "unknown holodex status, dropping");
            return None;
        }
    };
    let start_time = date_to_unix(payload.start_actual.as_deref())
        .or_else(|| date_to_unix(payload.start_scheduled.as_deref()))?;
    let channel_id = payload
        .channel_id
        .or_else(|| payload.channel.as_ref().and_then(|c| c.id.clone()))?;
    let org = payload.channel.and_then(|c| c.org);
    let is_member = payload
        .topic_id
        .as_deref()
        .is_some_and(|topic| topic.to_lowercase().contains("member"));

    Some(Video {
        id: payload.id,
        title: payload.title,
        start_time,
        channel_id,
        org,
        status,
        platform: Platform::Youtube,
        is_member,
    })
}

/// Typed client for the Holodex v2 API.
pub struct HolodexClient {
    client: reqwest::Client,
    api_key: Option<String>,
    base: String,
}

impl HolodexClient {
    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self { client, api_key, base: BASE.to_string() }
    }

    /// Override the base URL (tests).
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = base.into();
        self
    }

    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .get(format!("{}{}", self.base, path))
            .header("User-Agent", crate::USER_AGENT);
        if let Some(key) = &self.api_key {
            builder = builder.header("X-APIKEY", key);
        }
        builder
    }

    /// Current live and upcoming streams.
    pub async fn get_lives(&self) -> Result<Vec<Video>, DiscoveryError> {
        let response = self.request("/live").send().await?;
        if !response.status().is_success() {
            return Err(DiscoveryError::Status(response.status().as_u16()));
        }
        let payload: Vec<HolodexVideo> = response.json().await?;
        Ok(payload.into_iter().filter_map(coerce_video).collect())
    }

    /// Cursor-paginated listing of streams with the given status.
    pub async fn get_videos_paginated(&self, status: &str) -> Result<Vec<Video>, DiscoveryError> {
        let sort_by = match status {
            "upcoming" => "start_scheduled",
            "live" => "start_actual",
            _ => "available_at",
        };
        let mut collected = Vec::new();
        let mut offset = 0usize;
        loop {
            let response = self
                .request("/videos")
                .query(&[
                    ("type", "stream"),
                    ("include", "live_info"),
                    ("status", status),
                    ("sort", sort_by),
                    ("order", "asc"),
                    ("limit", &PAGE_LIMIT.to_string()),
                    ("paginated", "true"),
                    ("max_upcoming_hours", "48"),
                    ("offset", &offset.to_string()),
                ])
                .send()
                .await?;
            if !response.status().is_success() {
                break;
            }
            let page: PaginatedVideos = response.json().await?;
            let total = coerce_total(&page.total);
            if total == 0 {
                break;
            }
            let got = page.items.len();
            collected.extend(page.items.into_iter().filter_map(coerce_video));
            offset += PAGE_LIMIT;
            if got == 0 || offset >= total {
                break;
            }
        }
        Ok(collected)
    }

    /// Resolve a single video id; used by `POST /api/schedule`.
    pub async fn get_video(&self, video_id: &str) -> Result<Option<Video>, DiscoveryError> {
        let response = self
            .request("/videos")
            .query(&[("id", video_id), ("include", "live_info")])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(DiscoveryError::Status(response.status().as_u16()));
        }
        let payload: Vec<HolodexVideo> = response.json().await?;
        Ok(payload.into_iter().next().and_then(coerce_video))
    }
}

#[cfg(test)]
#[path = "holodex_tests.rs"]
mod tests;
