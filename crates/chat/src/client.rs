// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The chat continuation loop.

use crate::auth::{build_auth_headers, parse_netscape_cookies, NetscapeCookie};
use crate::errors::ChatError;
use crate::page::{parse_watch_page, validate_playability, ChatDetails};
use crate::parser::{clamp_timeout_ms, next_continuation, parse_actions};
use crate::writer::JsonArrayWriter;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use vtrec_core::{Clock, VideoStatus};

const WATCH_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36";

/// Sleep before re-checking an upcoming video whose chat has not opened.
const CHAT_DISABLED_RETRY: Duration = Duration::from_secs(30);

/// How a capture run finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatOutcome {
    /// The continuation chain ended naturally; the transcript is complete.
    Completed,
    /// Externally cancelled; the row stays pending for a later resume.
    Cancelled,
}

/// Choose the innertube endpoint for the broadcast state.
pub(crate) fn endpoint_for(status: VideoStatus) -> &'static str {
    match status {
        VideoStatus::Past => "live_chat/get_live_chat_replay",
        _ => "live_chat/get_live_chat",
    }
}

/// Cookie header value for the chat API.
pub(crate) fn cookie_header(cookies: &[NetscapeCookie]) -> String {
    cookies
        .iter()
        .map(|cookie| format!("{}={}", cookie.name, cookie.value))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Derive the replay seek offset for a resume point.
///
/// A replay message carries both its absolute timestamp and its offset
/// into the broadcast, which pins the broadcast start; the desired
/// offset is the resume timestamp relative to that.
pub(crate) fn derive_replay_offset_ms(
    messages: &[crate::parser::ChatMessage],
    resume_from_usec: i64,
) -> Option<i64> {
    let anchor = messages.iter().find(|m| m.time_in_seconds.is_some())?;
    let offset_usec = (anchor.time_in_seconds? * 1_000_000.0) as i64;
    let stream_begin_usec = anchor.timestamp - offset_usec;
    Some(((resume_from_usec - stream_begin_usec) / 1000).max(0))
}

/// The session cookie used for the SAPISID hash; the `__Secure-` variant
/// wins when both are present.
pub(crate) fn find_sapisid(cookies: &[NetscapeCookie]) -> Option<&str> {
    cookies
        .iter()
        .find(|c| c.name == "__Secure-3PAPISID")
        .or_else(|| cookies.iter().find(|c| c.name == "SAPISID"))
        .map(|c| c.value.as_str())
}

pub struct ChatClient<C: Clock> {
    http: reqwest::Client,
    cookies: Vec<NetscapeCookie>,
    clock: C,
}

impl<C: Clock> ChatClient<C> {
    /// Build a client, loading the Netscape cookie file when present.
    pub async fn new(http: reqwest::Client, cookies_file: Option<PathBuf>, clock: C) -> Self {
        let mut cookies = Vec::new();
        if let Some(path) = cookies_file {
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => match parse_netscape_cookies(&content) {
                    Ok(parsed) => {
                        tracing::info!(count = parsed.len(), path = %path.display(), "loaded cookies");
                        cookies = parsed;
                    }
                    Err(err) => {
                        tracing::error!(path = %path.display(), %err, "invalid cookie file, ignoring");
                    }
                },
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "could not read cookie file");
                }
            }
        }
        Self::from_parts(http, cookies, clock)
    }

    pub(crate) fn from_parts(
        http: reqwest::Client,
        cookies: Vec<NetscapeCookie>,
        clock: C,
    ) -> Self {
        Self { http, cookies, clock }
    }

    /// Chat API headers for the current instant: the SAPISID hash is
    /// time-stamped against this client's clock.
    pub(crate) fn auth_headers(&self, ytcfg: &Value) -> Vec<(String, String)> {
        build_auth_headers(ytcfg, find_sapisid(&self.cookies), self.clock.epoch_secs())
    }

    async fn fetch_details(&self, video_id: &str) -> Result<ChatDetails, ChatError> {
        let mut request = self
            .http
            .get(format!("https://youtube.com/watch?v={video_id}"))
            .header("User-Agent", WATCH_UA)
            .header("Accept-Language", "en-US, en, *");
        if !self.cookies.is_empty() {
            request = request.header("cookie", cookie_header(&self.cookies));
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ChatError::VideoUnavailable(format!(
                "watch page returned {}",
                response.status()
            )));
        }
        let html = response.text().await?;
        let details = parse_watch_page(&html)?;
        validate_playability(&details.player_response)?;
        Ok(details)
    }

    async fn poll(
        &self,
        details: &ChatDetails,
        endpoint: &str,
        api_key: &str,
        token: &str,
        offset_ms: Option<i64>,
    ) -> Result<Value, ChatError> {
        let context = details
            .ytcfg
            .get("INNERTUBE_CONTEXT")
            .cloned()
            .unwrap_or_else(|| json!({"client": {"clientName": "WEB", "clientVersion": "2.20240101.00.00"}}));
        let mut body = json!({"context": context, "continuation": token});
        if let Some(offset_ms) = offset_ms {
            body["currentPlayerState"] = json!({"playerOffsetMs": offset_ms.to_string()});
        }

        let mut request = self
            .http
            .post(format!(
                "https://www.youtube.com/youtubei/v1/{endpoint}?key={api_key}&prettyPrint=false"
            ))
            .header("User-Agent", WATCH_UA)
            .json(&body);
        for (name, value) in self.auth_headers(&details.ytcfg) {
            request = request.header(name, value);
        }
        if !self.cookies.is_empty() {
            request = request.header("cookie", cookie_header(&self.cookies));
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ChatError::Parse(format!(
                "continuation endpoint returned {}",
                response.status()
            )));
        }
        Ok(response.json().await?)
    }

    /// Drive the capture until the chat ends or the token fires.
    ///
    /// `resume_from` is the last already-captured timestamp
    /// (microseconds); messages at or before it are filtered out.
    pub async fn run(
        &self,
        video_id: &str,
        writer: &mut JsonArrayWriter,
        resume_from: Option<i64>,
        cancel: CancellationToken,
    ) -> Result<ChatOutcome, ChatError> {
        // Chat-disabled on an upcoming video retries until the chat
        // opens; on live/past it terminates.
        let (details, continuation) = loop {
            let details = self.fetch_details(video_id).await?;
            match details.all_messages_continuation() {
                Ok(info) => {
                    let token = info.continuation.clone();
                    break (details, token);
                }
                Err(err) if err.is_retryable() => {
                    tracing::info!(video_id, "chat not open yet, retrying");
                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(ChatOutcome::Cancelled),
                        _ = tokio::time::sleep(CHAT_DISABLED_RETRY) => {}
                    }
                }
                Err(err) => return Err(err),
            }
        };

        let endpoint = endpoint_for(details.status);
        let api_key = details
            .ytcfg
            .get("INNERTUBE_API_KEY")
            .and_then(Value::as_str)
            .ok_or_else(|| ChatError::Parse("no innertube api key".to_string()))?
            .to_string();

        let is_replay = details.status == VideoStatus::Past;
        let mut token = continuation;
        let mut written: u64 = 0;
        // For replays the first batch anchors the broadcast start, from
        // which the resume timestamp converts into a seek offset.
        let mut pending_offset: Option<i64> = None;
        let mut offset_derived = !(is_replay && resume_from.is_some());
        loop {
            if cancel.is_cancelled() {
                writer.flush().await?;
                return Ok(ChatOutcome::Cancelled);
            }

            let response = self
                .poll(&details, endpoint, &api_key, &token, pending_offset.take())
                .await?;
            let messages = parse_actions(&response);
            if !offset_derived {
                offset_derived = true;
                if let Some(resume) = resume_from {
                    if let Some(offset_ms) = derive_replay_offset_ms(&messages, resume) {
                        tracing::info!(video_id, offset_ms, "seeking replay chat to resume point");
                        pending_offset = Some(offset_ms);
                    }
                }
            }
            for message in messages {
                if resume_from.is_some_and(|last| message.timestamp <= last) {
                    continue;
                }
                writer.write(&message).await?;
                written += 1;
            }
            writer.flush().await?;

            let Some((next_token, timeout_ms)) = next_continuation(&response) else {
                tracing::info!(video_id, written, "chat continuation chain ended");
                return Ok(ChatOutcome::Completed);
            };
            token = next_token;

            let sleep = Duration::from_millis(clamp_timeout_ms(timeout_ms));
            tokio::select! {
                _ = cancel.cancelled() => {
                    writer.flush().await?;
                    return Ok(ChatOutcome::Cancelled);
                }
                _ = tokio::time::sleep(sleep) => {}
            }
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
