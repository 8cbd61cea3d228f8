// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Continuation response decoding and message normalization.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Continuation sleep clamp, milliseconds.
pub const TIMEOUT_CLAMP_MS: u64 = 8_000;

/// Uniform message shape written to the transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub message_type: String,
    pub message: String,
    /// Microseconds since the unix epoch.
    pub timestamp: i64,
    /// Replay offset into the broadcast, seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_in_seconds: Option<f64>,
    pub author: ChatAuthor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub money: Option<ChatMoney>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_background_colour: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatAuthor {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub badges: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMoney {
    pub text: String,
}

/// Convert an ARGB integer into `#rrggbbaa`.
pub fn argb_to_hex(argb: i64) -> String {
    let red = (argb >> 16) & 255;
    let green = (argb >> 8) & 255;
    let blue = argb & 255;
    let alpha = (argb >> 24) & 255;
    format!("#{red:02x}{green:02x}{blue:02x}{alpha:02x}")
}

/// Clamp a server-suggested continuation sleep into `[0, 8000]` ms.
pub fn clamp_timeout_ms(suggested: u64) -> u64 {
    suggested.min(TIMEOUT_CLAMP_MS)
}

/// Flatten message runs, expanding emoji into their first shortcut.
fn flatten_runs(message: &Value) -> String {
    let Some(runs) = message.get("runs").and_then(Value::as_array) else {
        return message
            .get("simpleText")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
    };
    let mut out = String::new();
    for run in runs {
        if let Some(text) = run.get("text").and_then(Value::as_str) {
            out.push_str(text);
        } else if let Some(emoji) = run.get("emoji") {
            let label = emoji
                .pointer("/shortcuts/0")
                .and_then(Value::as_str)
                .or_else(|| emoji.get("emojiId").and_then(Value::as_str))
                .unwrap_or_default();
            out.push_str(label);
        }
    }
    out
}

fn author_badges(renderer: &Value) -> Vec<String> {
    renderer
        .get("authorBadges")
        .and_then(Value::as_array)
        .map(|badges| {
            badges
                .iter()
                .filter_map(|badge| {
                    badge
                        .pointer("/liveChatAuthorBadgeRenderer/tooltip")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .collect()
        })
        .unwrap_or_default()
}

fn renderer_kind(item: &Value) -> Option<(&'static str, &Value)> {
    for (key, kind) in [
        ("liveChatTextMessageRenderer", "text_message"),
        ("liveChatPaidMessageRenderer", "paid_message"),
        ("liveChatPaidStickerRenderer", "paid_sticker"),
        ("liveChatMembershipItemRenderer", "membership_item"),
    ] {
        if let Some(renderer) = item.get(key) {
            return Some((kind, renderer));
        }
    }
    None
}

/// Normalize one chat item into a [`ChatMessage`]. Unknown renderers
/// return `None` and are skipped.
pub fn remap_item(item: &Value, offset_msec: Option<i64>) -> Option<ChatMessage> {
    let (kind, renderer) = renderer_kind(item)?;

    let id = renderer.get("id").and_then(Value::as_str)?.to_string();
    let timestamp: i64 = renderer
        .get("timestampUsec")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())?;

    let message = renderer
        .get("message")
        .or_else(|| renderer.get("headerSubtext"))
        .map(flatten_runs)
        .unwrap_or_default();

    let author = ChatAuthor {
        id: renderer
            .get("authorExternalChannelId")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        name: renderer
            .pointer("/authorName/simpleText")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        badges: author_badges(renderer),
    };

    let money = renderer
        .pointer("/purchaseAmountText/simpleText")
        .and_then(Value::as_str)
        .map(|text| ChatMoney { text: text.to_string() });

    let body_background_colour = renderer
        .get("bodyBackgroundColor")
        .and_then(Value::as_i64)
        .map(argb_to_hex);

    Some(ChatMessage {
        id,
        message_type: kind.to_string(),
        message,
        timestamp,
        time_in_seconds: offset_msec.map(|ms| ms as f64 / 1000.0),
        author,
        money,
        body_background_colour,
    })
}

/// Decode the action list of one continuation response into messages.
/// Handles both the live shape (`addChatItemAction`) and the replay shape
/// (`replayChatItemAction` wrapping inner actions with a video offset).
pub fn parse_actions(response: &Value) -> Vec<ChatMessage> {
    let Some(actions) = response
        .pointer("/continuationContents/liveChatContinuation/actions")
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    let mut messages = Vec::new();
    for action in actions {
        if let Some(item) = action.pointer("/addChatItemAction/item") {
            if let Some(message) = remap_item(item, None) {
                messages.push(message);
            }
        } else if let Some(replay) = action.get("replayChatItemAction") {
            let offset = replay
                .get("videoOffsetTimeMsec")
                .and_then(Value::as_str)
                .and_then(|s| s.parse().ok());
            let Some(inner) = replay.get("actions").and_then(Value::as_array) else {
                continue;
            };
            for inner_action in inner {
                if let Some(item) = inner_action.pointer("/addChatItemAction/item") {
                    if let Some(message) = remap_item(item, offset) {
                        messages.push(message);
                    }
                }
            }
        }
    }
    messages
}

/// Next continuation token plus the server-suggested sleep.
pub fn next_continuation(response: &Value) -> Option<(String, u64)> {
    let continuations = response
        .pointer("/continuationContents/liveChatContinuation/continuations")
        .and_then(Value::as_array)?;
    let first = continuations.first()?;
    for key in [
        "invalidationContinuationData",
        "timedContinuationData",
        "liveChatReplayContinuationData",
        "reloadContinuationData",
        "playerSeekContinuationData",
    ] {
        if let Some(data) = first.get(key) {
            let token = data.get("continuation").and_then(Value::as_str)?.to_string();
            let timeout = data
                .get("timeoutMs")
                .and_then(Value::as_u64)
                .unwrap_or(TIMEOUT_CLAMP_MS);
            return Some((token, timeout));
        }
    }
    None
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
