// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

fn payload(value: serde_json::Value) -> HolodexVideo {
    serde_json::from_value(value).unwrap()
}

#[test]
fn coerces_live_stream() {
    let video = coerce_video(payload(json!({
        "id": "abc123",
        "title": "singing",
        "type": "stream",
        "status": "live",
        "start_actual": "2024-01-01T12:00:00Z",
        "start_scheduled": "2024-01-01T11:00:00Z",
        "channel_id": "UCchan",
        "channel": {"id": "UCchan", "org": "Hololive"},
        "topic_id": "singing",
    })))
    .unwrap();

    assert_eq!(video.id, "abc123");
    assert_eq!(video.status, VideoStatus::Live);
    // Actual start preferred over scheduled.
    assert_eq!(video.start_time, 1_704_110_400);
    assert_eq!(video.org.as_deref(), Some("Hololive"));
    assert!(!video.is_member);
    assert_eq!(video.platform, Platform::Youtube);
}

#[test]
fn falls_back_to_scheduled_start() {
    let video = coerce_video(payload(json!({
        "id": "abc123",
        "title": "t",
        "type": "stream",
        "status": "upcoming",
        "start_scheduled": "2024-01-01T11:00:00Z",
        "channel_id": "UCchan",
    })))
    .unwrap();
    assert_eq!(video.start_time, 1_704_106_800);
    assert_eq!(video.status, VideoStatus::Upcoming);
}

#[test]
fn member_topic_marks_membership() {
    let video = coerce_video(payload(json!({
        "id": "abc123",
        "title": "t",
        "type": "stream",
        "status": "upcoming",
        "start_scheduled": "2024-01-01T11:00:00Z",
        "channel_id": "UCchan",
        "topic_id": "Membersonly",
    })))
    .unwrap();
    assert!(video.is_member);
}

#[test]
fn rejects_clips_and_missing() {
    assert!(coerce_video(payload(json!({
        "id": "clip1",
        "title": "clip",
        "type": "clip",
        "status": "past",
        "start_scheduled": "2024-01-01T11:00:00Z",
        "channel_id": "UCclipper",
    })))
    .is_none());

    assert!(coerce_video(payload(json!({
        "id": "gone",
        "title": "privated",
        "type": "stream",
        "status": "missing",
        "start_scheduled": "2024-01-01T11:00:00Z",
        "channel_id": "UCchan",
    })))
    .is_none());
}

#[test]
fn rejects_video_without_channel_or_start() {
    assert!(coerce_video(payload(json!({
        "id": "x",
        "title": "t",
        "type": "stream",
        "status": "live",
        "start_actual": "2024-01-01T12:00:00Z",
    })))
    .is_none());

    assert!(coerce_video(payload(json!({
        "id": "x",
        "title": "t",
        "type": "stream",
        "status": "live",
        "channel_id": "UCchan",
    })))
    .is_none());
}

#[test]
fn channel_id_falls_back_to_nested_channel() {
    let video = coerce_video(payload(json!({
        "id": "x",
        "title": "t",
        "type": "stream",
        "status": "live",
        "start_actual": "2024-01-01T12:00:00Z",
        "channel": {"id": "UCnested"},
    })))
    .unwrap();
    assert_eq!(video.channel_id, "UCnested");
}

#[test]
fn total_coerces_from_string_or_number() {
    assert_eq!(coerce_total(&json!("120")), 120);
    assert_eq!(coerce_total(&json!(55)), 55);
    assert_eq!(coerce_total(&json!(null)), 0);
}
