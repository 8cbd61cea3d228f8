// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ihateani.me GraphQL live-index client for the non-YouTube platforms.

use crate::DiscoveryError;
use serde::Deserialize;
use serde_json::json;
use vtrec_core::{Platform, Video, VideoStatus};

const BASE: &str = "https://api.ihateani.me/v2/graphql";

pub(crate) const DEFAULT_PLATFORMS: [&str; 4] = ["twitch", "twitcasting", "mildom", "twitter"];

const LIVE_QUERY: &str = r#"
query VTuberLives($cursor:String,$platforms:[PlatformName]) {
    vtuber {
        videos(cursor:$cursor,limit:100,platforms:$platforms,statuses:[live,upcoming]) {
            _total
            items {
                id
                title
                status
                channel_id
                timeData {
                    startTime
                    scheduledStartTime
                }
                platform
                group
                is_member
            }
            pageInfo {
                hasNextPage
                nextCursor
            }
        }
    }
}
"#;

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<GraphqlData>,
}

#[derive(Debug, Deserialize)]
struct GraphqlData {
    vtuber: Option<VtuberQuery>,
}

#[derive(Debug, Deserialize)]
struct VtuberQuery {
    videos: Option<VideoPage>,
}

#[derive(Debug, Deserialize)]
struct VideoPage {
    #[serde(default)]
    items: Vec<LiveItem>,
    #[serde(rename = "pageInfo")]
    page_info: Option<PageInfo>,
}

#[derive(Debug, Deserialize)]
struct PageInfo {
    #[serde(rename = "hasNextPage", default)]
    has_next_page: bool,
    #[serde(rename = "nextCursor")]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LiveItem {
    id: String,
    title: String,
    status: Option<String>,
    channel_id: String,
    #[serde(rename = "timeData")]
    time_data: Option<TimeData>,
    platform: String,
    group: Option<String>,
    #[serde(default)]
    is_member: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TimeData {
    #[serde(rename = "startTime")]
    start_time: Option<i64>,
    #[serde(rename = "scheduledStartTime")]
    scheduled_start_time: Option<i64>,
}

fn truthy(value: Option<&serde_json::Value>) -> bool {
    match value {
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::Number(n)) => n.as_i64().unwrap_or(0) > 0,
        Some(serde_json::Value::String(s)) => {
            matches!(s.to_lowercase().as_str(), "true" | "yes" | "1" | "y")
        }
        _ => false,
    }
}

/// Normalize one live-index item into a [`Video`].
pub(crate) fn coerce_item(item: LiveItem) -> Option<Video> {
    let platform = Platform::parse(&item.platform)?;
    let status = match item.status.as_deref() {
        Some("live") => VideoStatus::Live,
        Some("upcoming") => VideoStatus::Upcoming,
        Some("past") => VideoStatus::Past,
        _ => return None,
    };
    let start_time = item
        .time_data
        .as_ref()
        .and_then(|t| t.start_time.or(t.scheduled_start_time))?;
    let is_member = truthy(item.is_member.as_ref());
    Some(Video {
        id: item.id,
        title: item.title,
        start_time,
        channel_id: item.channel_id,
        org: item.group,
        status,
        platform,
        is_member,
    })
}

/// GraphQL client for the live index.
pub struct LiveIndexClient {
    client: reqwest::Client,
    base: String,
}

impl LiveIndexClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client, base: BASE.to_string() }
    }

    /// Override the endpoint (tests).
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = base.into();
        self
    }

    /// Live and upcoming streams across the non-YouTube platforms,
    /// following the cursor until the index is exhausted.
    pub async fn get_lives(&self) -> Result<Vec<Video>, DiscoveryError> {
        let mut collected = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let body = json!({
                "query": LIVE_QUERY,
                "variables": {
                    "platforms": DEFAULT_PLATFORMS,
                    "cursor": cursor,
                },
            });
            let response = self
                .client
                .post(&self.base)
                .header("User-Agent", crate::USER_AGENT)
                .json(&body)
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(DiscoveryError::Status(response.status().as_u16()));
            }
            let payload: GraphqlResponse = response.json().await?;
            let Some(page) = payload
                .data
                .and_then(|d| d.vtuber)
                .and_then(|v| v.videos)
            else {
                break;
            };
            collected.extend(page.items.into_iter().filter_map(coerce_item));
            match page.page_info {
                Some(info) if info.has_next_page && info.next_cursor.is_some() => {
                    cursor = info.next_cursor;
                }
                _ => break,
            }
        }
        Ok(collected)
    }
}

#[cfg(test)]
#[path = "graphql_tests.rs"]
mod tests;
