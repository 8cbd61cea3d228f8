// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use yare::parameterized;

fn item(value: serde_json::Value) -> LiveItem {
    serde_json::from_value(value).unwrap()
}

#[test]
fn coerces_twitcasting_item() {
    let video = coerce_item(item(json!({
        "id": "712345",
        "title": "morning radio",
        "status": "live",
        "channel_id": "caster",
        "timeData": {"startTime": 1_700_000_000, "scheduledStartTime": 1_699_990_000},
        "platform": "twitcasting",
        "group": "indie",
        "is_member": false,
    })))
    .unwrap();

    assert_eq!(video.platform, Platform::Twitcasting);
    assert_eq!(video.start_time, 1_700_000_000);
    assert_eq!(video.job_id(), "twcast-712345");
    assert_eq!(video.org.as_deref(), Some("indie"));
}

#[test]
fn scheduled_time_used_when_start_missing() {
    let video = coerce_item(item(json!({
        "id": "sp1",
        "title": "space",
        "status": "upcoming",
        "channel_id": "host",
        "timeData": {"scheduledStartTime": 1_700_050_000},
        "platform": "twitter",
    })))
    .unwrap();
    assert_eq!(video.start_time, 1_700_050_000);
    assert_eq!(video.platform, Platform::Twitter);
}

#[test]
fn unknown_platform_dropped() {
    assert!(coerce_item(item(json!({
        "id": "b1",
        "title": "t",
        "status": "live",
        "channel_id": "c",
        "timeData": {"startTime": 1},
        "platform": "bilibili",
    })))
    .is_none());
}

#[test]
fn missing_time_data_dropped() {
    assert!(coerce_item(item(json!({
        "id": "m1",
        "title": "t",
        "status": "live",
        "channel_id": "c",
        "platform": "mildom",
    })))
    .is_none());
}

#[parameterized(
    bool_true = { json!(true), true },
    bool_false = { json!(false), false },
    int_one = { json!(1), true },
    string_yes = { json!("yes"), true },
    string_no = { json!("no"), false },
    null = { json!(null), false },
)]
fn member_flag_is_coerced(raw: serde_json::Value, expected: bool) {
    let video = coerce_item(item(json!({
        "id": "x",
        "title": "t",
        "status": "live",
        "channel_id": "c",
        "timeData": {"startTime": 1},
        "platform": "twitch",
        "is_member": raw,
    })))
    .unwrap();
    assert_eq!(video.is_member, expected);
}
