// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

fn watch_html(player_response: &Value, initial_data: &Value) -> String {
    format!(
        "<html><script>ytcfg.set({}) ;</script>\
<script>var ytInitialData = {};</script>\
<script>var ytInitialPlayerResponse = {};\n</script></html>",
        json!({"INNERTUBE_API_KEY": "key123", "INNERTUBE_CONTEXT": {"client": {"visitorData": "visitor"}}}),
        initial_data,
        player_response,
    )
}

fn live_player_response() -> Value {
    json!({
        "playabilityStatus": {"status": "OK"},
        "videoDetails": {
            "videoId": "abc123",
            "title": "singing",
            "channelId": "UCchan",
            "isLiveContent": true,
            "isLive": true,
        },
    })
}

fn initial_data_with_chat() -> Value {
    json!({
        "contents": {"twoColumnWatchNextResults": {"conversationBar": {"liveChatRenderer": {
            "header": {"liveChatHeaderRenderer": {"viewSelector": {"sortFilterSubMenuRenderer": {
                "subMenuItems": [
                    {"title": "Top chat", "selected": true,
                     "continuation": {"reloadContinuationData": {"continuation": "top-token"}}},
                    {"title": "Live chat", "selected": false,
                     "continuation": {"reloadContinuationData": {"continuation": "all-token"}}},
                ],
            }}}},
        }}}},
    })
}

#[test]
fn parses_all_three_blocks() {
    let html = watch_html(&live_player_response(), &initial_data_with_chat());
    let details = parse_watch_page(&html).unwrap();
    assert_eq!(details.id, "abc123");
    assert_eq!(details.channel_id, "UCchan");
    assert_eq!(details.status, VideoStatus::Live);
    assert!(!details.is_premiere);
    assert_eq!(details.ytcfg["INNERTUBE_API_KEY"], "key123");
    assert_eq!(details.continuations.len(), 2);
    assert_eq!(details.all_messages_continuation().unwrap().continuation, "all-token");
}

#[test]
fn upcoming_and_past_status() {
    let mut pr = live_player_response();
    pr["videoDetails"]["isLive"] = json!(false);
    pr["videoDetails"]["isUpcoming"] = json!(true);
    let html = watch_html(&pr, &initial_data_with_chat());
    assert_eq!(parse_watch_page(&html).unwrap().status, VideoStatus::Upcoming);

    pr["videoDetails"]["isUpcoming"] = json!(false);
    let html = watch_html(&pr, &initial_data_with_chat());
    assert_eq!(parse_watch_page(&html).unwrap().status, VideoStatus::Past);
}

#[test]
fn missing_chat_renderer_is_chat_disabled() {
    let html = watch_html(&live_player_response(), &json!({"contents": {}}));
    let details = parse_watch_page(&html).unwrap();
    let err = details.all_messages_continuation().unwrap_err();
    assert!(matches!(err, ChatError::ChatDisabled { status: VideoStatus::Live }));
}

#[test]
fn playability_maps_to_typed_exits() {
    assert!(validate_playability(&json!({"playabilityStatus": {"status": "OK"}})).is_ok());
    assert!(matches!(
        validate_playability(&json!({"playabilityStatus": {"status": "ERROR", "reason": "gone"}})),
        Err(ChatError::VideoUnavailable(reason)) if reason == "gone"
    ));
    assert!(matches!(
        validate_playability(&json!({"playabilityStatus": {"status": "LOGIN_REQUIRED"}})),
        Err(ChatError::LoginRequired(_))
    ));
    assert!(matches!(
        validate_playability(&json!({"playabilityStatus": {"status": "UNPLAYABLE"}})),
        Err(ChatError::Unplayable(_))
    ));
}

#[test]
fn missing_blocks_are_parse_errors() {
    assert!(matches!(
        parse_watch_page("<html>nothing here</html>"),
        Err(ChatError::Parse(_))
    ));
}
