// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Watch-page parsing: the three embedded JSON blocks and playability.

use crate::errors::ChatError;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use vtrec_core::VideoStatus;

const INITIAL_BOUNDARY: &str = r"\s*(?:var\s+meta|</script|\n)";

#[allow(clippy::unwrap_used)] // static pattern
fn initial_data_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r#"(?:window\s*\[\s*["']ytInitialData["']\s*\]|ytInitialData)\s*=\s*(\{{.+?\}})\s*;{INITIAL_BOUNDARY}"#
        ))
        .unwrap()
    })
}

#[allow(clippy::unwrap_used)] // static pattern
fn player_response_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"ytInitialPlayerResponse\s*=\s*(\{{.+?\}})\s*;{INITIAL_BOUNDARY}"
        ))
        .unwrap()
    })
}

#[allow(clippy::unwrap_used)] // static pattern
fn cfg_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"ytcfg\.set\s*\(\s*(\{.+?\})\s*\)\s*;").unwrap())
}

fn extract_json(re: &Regex, html: &str) -> Option<Value> {
    let caps = re.captures(html)?;
    serde_json::from_str(caps.get(1)?.as_str()).ok()
}

/// One chat view continuation ("Top chat" / "Live chat").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationInfo {
    pub title: String,
    pub continuation: String,
    pub selected: bool,
}

/// Everything the capture loop needs from the watch page.
#[derive(Debug)]
pub struct ChatDetails {
    pub id: String,
    pub title: String,
    pub channel_id: String,
    pub status: VideoStatus,
    pub is_premiere: bool,
    pub continuations: Vec<ContinuationInfo>,
    pub initial_data: Value,
    pub player_response: Value,
    pub ytcfg: Value,
}

const SUB_MENU_PATH: &str = "/contents/twoColumnWatchNextResults/conversationBar/liveChatRenderer/header/liveChatHeaderRenderer/viewSelector/sortFilterSubMenuRenderer/subMenuItems";

fn parse_continuations(initial_data: &Value) -> Vec<ContinuationInfo> {
    let Some(items) = initial_data.pointer(SUB_MENU_PATH).and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let continuation = item
                .pointer("/continuation/reloadContinuationData/continuation")?
                .as_str()?
                .to_string();
            Some(ContinuationInfo {
                title: item
                    .get("title")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                continuation,
                selected: item.get("selected").and_then(Value::as_bool).unwrap_or(false),
            })
        })
        .collect()
}

/// Map the player response's playability status into typed exits.
pub fn validate_playability(player_response: &Value) -> Result<(), ChatError> {
    let status = player_response
        .pointer("/playabilityStatus/status")
        .and_then(Value::as_str)
        .unwrap_or("OK");
    let reason = player_response
        .pointer("/playabilityStatus/reason")
        .and_then(Value::as_str)
        .unwrap_or("unknown reason")
        .to_string();
    match status {
        "ERROR" => Err(ChatError::VideoUnavailable(reason)),
        "LOGIN_REQUIRED" => Err(ChatError::LoginRequired(reason)),
        "UNPLAYABLE" => Err(ChatError::Unplayable(reason)),
        _ => Ok(()),
    }
}

/// Parse the watch page HTML into [`ChatDetails`].
pub fn parse_watch_page(html: &str) -> Result<ChatDetails, ChatError> {
    let initial_data = extract_json(initial_data_re(), html)
        .ok_or_else(|| ChatError::Parse("ytInitialData block not found".to_string()))?;
    let player_response = extract_json(player_response_re(), html)
        .ok_or_else(|| ChatError::Parse("ytInitialPlayerResponse block not found".to_string()))?;
    let ytcfg = extract_json(cfg_re(), html)
        .ok_or_else(|| ChatError::Parse("ytcfg block not found".to_string()))?;

    let details = player_response.get("videoDetails").cloned().unwrap_or_default();
    let get = |key: &str| {
        details
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let truthy = |key: &str| details.get(key).and_then(Value::as_bool).unwrap_or(false);

    let status = if truthy("isLive") || truthy("isLiveNow") {
        VideoStatus::Live
    } else if truthy("isUpcoming") {
        VideoStatus::Upcoming
    } else {
        VideoStatus::Past
    };

    Ok(ChatDetails {
        id: get("videoId"),
        title: get("title"),
        channel_id: get("channelId"),
        status,
        is_premiere: !truthy("isLiveContent"),
        continuations: parse_continuations(&initial_data),
        initial_data,
        player_response,
        ytcfg,
    })
}

impl ChatDetails {
    /// The all-messages continuation. The page offers "Top chat" first
    /// and the unfiltered view second; a page without both has chat
    /// disabled.
    pub fn all_messages_continuation(&self) -> Result<&ContinuationInfo, ChatError> {
        if self.continuations.len() < 2 {
            return Err(ChatError::ChatDisabled { status: self.status });
        }
        Ok(&self.continuations[1])
    }
}

#[cfg(test)]
#[path = "page_tests.rs"]
mod tests;
