// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live HLS byte-stream reader.
//!
//! Polls the media playlist, fetches new segments in sequence order, and
//! yields their bytes. An empty read signals end of stream, matching the
//! read-in-a-loop contract the Twitch downloader expects.

use crate::ExtractorError;
use std::collections::VecDeque;
use std::time::Duration;

/// Consecutive empty playlist refreshes tolerated before the stream is
/// considered over.
const STALL_LIMIT: u32 = 10;
const REFRESH_DELAY: Duration = Duration::from_secs(2);

pub struct HlsLiveStream {
    client: reqwest::Client,
    playlist_url: String,
    headers: Vec<(String, String)>,
    last_seq: Option<u64>,
    pending: VecDeque<String>,
    ended: bool,
    stalls: u32,
}

/// Parsed media playlist: starting sequence number, segment URIs, and the
/// end-of-stream marker.
pub(crate) struct MediaPlaylist {
    pub media_sequence: u64,
    pub segments: Vec<String>,
    pub ended: bool,
}

/// Minimal media-playlist parse; only the tags the reader needs.
pub(crate) fn parse_media_playlist(text: &str) -> MediaPlaylist {
    let mut media_sequence = 0;
    let mut segments = Vec::new();
    let mut ended = false;
    for line in text.lines() {
        let line = line.trim();
        if let Some(value) = line.strip_prefix("#EXT-X-MEDIA-SEQUENCE:") {
            media_sequence = value.trim().parse().unwrap_or(0);
        } else if line == "#EXT-X-ENDLIST" {
            ended = true;
        } else if !line.is_empty() && !line.starts_with('#') {
            segments.push(line.to_string());
        }
    }
    MediaPlaylist { media_sequence, segments, ended }
}

/// Resolve a possibly-relative segment URI against the playlist URL.
pub(crate) fn resolve_segment_url(playlist_url: &str, segment: &str) -> String {
    if segment.starts_with("http://") || segment.starts_with("https://") {
        return segment.to_string();
    }
    match playlist_url.rfind('/') {
        Some(idx) => format!("{}/{}", &playlist_url[..idx], segment),
        None => segment.to_string(),
    }
}

impl HlsLiveStream {
    pub fn new(
        client: reqwest::Client,
        playlist_url: impl Into<String>,
        headers: Vec<(String, String)>,
    ) -> Self {
        Self {
            client,
            playlist_url: playlist_url.into(),
            headers,
            last_seq: None,
            pending: VecDeque::new(),
            ended: false,
            stalls: 0,
        }
    }

    fn apply_headers(&self, mut builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        for (key, value) in &self.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        builder
    }

    async fn refresh(&mut self) -> Result<(), ExtractorError> {
        let response = self
            .apply_headers(self.client.get(&self.playlist_url))
            .send()
            .await?;
        if !response.status().is_success() {
            // Playlists 404 once the broadcast ends.
            self.ended = true;
            return Ok(());
        }
        let text = response.text().await?;
        let playlist = parse_media_playlist(&text);

        let mut fresh = 0;
        for (offset, segment) in playlist.segments.iter().enumerate() {
            let seq = playlist.media_sequence + offset as u64;
            if self.last_seq.is_some_and(|last| seq <= last) {
                continue;
            }
            self.last_seq = Some(seq);
            self.pending.push_back(segment.clone());
            fresh += 1;
        }
        if playlist.ended {
            self.ended = true;
        } else if fresh == 0 {
            self.stalls += 1;
            if self.stalls >= STALL_LIMIT {
                tracing::info!(url = %self.playlist_url, "playlist stalled, treating as ended");
                self.ended = true;
            }
        } else {
            self.stalls = 0;
        }
        Ok(())
    }

    /// Read the next segment's bytes. An empty vec means the stream is
    /// over.
    pub async fn read(&mut self) -> Result<Vec<u8>, ExtractorError> {
        loop {
            if let Some(segment) = self.pending.pop_front() {
                let url = resolve_segment_url(&self.playlist_url, &segment);
                let response = self.apply_headers(self.client.get(&url)).send().await?;
                if !response.status().is_success() {
                    tracing::warn!(%url, status = %response.status(), "segment fetch failed, skipping");
                    continue;
                }
                return Ok(response.bytes().await?.to_vec());
            }
            if self.ended {
                return Ok(Vec::new());
            }
            self.refresh().await?;
            if self.pending.is_empty() && !self.ended {
                tokio::time::sleep(REFRESH_DELAY).await;
            }
        }
    }
}

#[cfg(test)]
#[path = "hls_tests.rs"]
mod tests;
