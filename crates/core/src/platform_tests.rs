// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    youtube = { "dQw4w9WgXcQ", Platform::Youtube },
    twitcasting = { "twcast-123456", Platform::Twitcasting },
    twitter = { "twtsp-1OdKrBnaEPXKX", Platform::Twitter },
    twitch = { "ttv-vod-998877", Platform::Twitch },
    mildom = { "mildom-vod-10883009", Platform::Mildom },
)]
fn routes_job_id_prefix(id: &str, expected: Platform) {
    assert_eq!(Platform::from_job_id(id), expected);
}

#[test]
fn job_id_round_trips_native_id() {
    for platform in [
        Platform::Youtube,
        Platform::Twitch,
        Platform::Twitcasting,
        Platform::Twitter,
        Platform::Mildom,
    ] {
        let job_id = platform.job_id("abc123");
        assert_eq!(platform.native_id(&job_id), "abc123");
        assert_eq!(Platform::from_job_id(&job_id), platform);
    }
}

#[test]
fn parse_rejects_unknown() {
    assert_eq!(Platform::parse("bilibili"), None);
    assert_eq!(Platform::parse("twitch"), Some(Platform::Twitch));
}

#[test]
fn twitter_is_audio_only() {
    assert!(!Platform::Twitter.is_video());
    assert!(Platform::Youtube.is_video());
}

#[test]
fn serializes_lowercase() {
    let json = serde_json::to_string(&Platform::Twitcasting).unwrap();
    assert_eq!(json, "\"twitcasting\"");
}
