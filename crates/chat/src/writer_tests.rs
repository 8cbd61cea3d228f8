// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::{json, Value};

async fn read_array(path: &Path) -> Vec<Value> {
    let text = tokio::fs::read_to_string(path).await.unwrap();
    serde_json::from_str(&text).unwrap()
}

#[tokio::test]
async fn empty_then_single_element() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chat.json");
    let mut writer = JsonArrayWriter::open(&path, false).await.unwrap();

    writer.write(&json!({"id": "a", "timestamp": 1})).await.unwrap();
    writer.flush().await.unwrap();

    let parsed = read_array(&path).await;
    assert_eq!(parsed.len(), 1);
    assert_eq!(parsed[0]["id"], "a");

    // The document ends with the newline-bracket terminator.
    let raw = tokio::fs::read_to_string(&path).await.unwrap();
    assert!(raw.starts_with('['));
    assert!(raw.ends_with("\n]"));
}

#[tokio::test]
async fn file_is_valid_json_after_every_write() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chat.json");
    let mut writer = JsonArrayWriter::open(&path, false).await.unwrap();

    for i in 0..10 {
        writer.write(&json!({"id": i, "timestamp": i * 1000})).await.unwrap();
        writer.flush().await.unwrap();

        // A concurrent reader sees a complete array at every boundary.
        let parsed = read_array(&path).await;
        assert_eq!(parsed.len(), i + 1);
    }
}

#[tokio::test]
async fn preserve_reloads_previous_elements() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chat.json");
    {
        let mut writer = JsonArrayWriter::open(&path, false).await.unwrap();
        writer.write(&json!({"id": "first"})).await.unwrap();
        writer.close().await.unwrap();
    }
    {
        let mut writer = JsonArrayWriter::open(&path, true).await.unwrap();
        writer.write(&json!({"id": "second"})).await.unwrap();
        writer.close().await.unwrap();
    }

    let parsed = read_array(&path).await;
    assert_eq!(parsed.len(), 2);
    assert_eq!(parsed[0]["id"], "first");
    assert_eq!(parsed[1]["id"], "second");
}

#[tokio::test]
async fn preserve_recovers_elements_before_a_torn_tail() {
    // A crash mid-write leaves a partial trailing element; resuming must
    // keep every complete message captured before it.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chat.json");
    {
        let mut writer = JsonArrayWriter::open(&path, false).await.unwrap();
        writer.write(&json!({"id": "m1", "timestamp": 1})).await.unwrap();
        writer.write(&json!({"id": "m2", "timestamp": 2})).await.unwrap();
        writer.close().await.unwrap();
    }
    // Tear the tail: drop the closing bracket and leave a half-written
    // third element behind.
    let mut raw = tokio::fs::read_to_string(&path).await.unwrap();
    raw.truncate(raw.len() - 2);
    raw.push_str(", \n  {\n    \"id\": \"m3\", \"times");
    tokio::fs::write(&path, &raw).await.unwrap();

    let mut writer = JsonArrayWriter::open(&path, true).await.unwrap();
    writer.write(&json!({"id": "m3", "timestamp": 3})).await.unwrap();
    writer.close().await.unwrap();

    let parsed = read_array(&path).await;
    let ids: Vec<&str> = parsed.iter().map(|m| m["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["m1", "m2", "m3"]);
}

#[test]
fn recover_prefix_walks_back_to_last_complete_element() {
    let torn = b"[\n  {\n    \"id\": \"a\"\n  }, \n  {\n    \"id\": \"b\"\n  }, \n  {\n    \"id\": \"c\", \"par";
    let recovered = recover_array_prefix(torn);
    assert_eq!(recovered.len(), 2);
    assert_eq!(recovered[1]["id"], "b");

    // An intact document parses directly.
    let intact = b"[\n  {\n    \"id\": \"a\"\n  }\n]";
    assert_eq!(recover_array_prefix(intact).len(), 1);

    // Nothing recoverable yields nothing.
    assert!(recover_array_prefix(b"{ not an array").is_empty());
    assert!(recover_array_prefix(b"").is_empty());
}

#[tokio::test]
async fn preserve_keeps_nothing_when_no_element_ever_completed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chat.json");
    tokio::fs::write(&path, "[\n  {\n    \"id\": \"half").await.unwrap();

    let mut writer = JsonArrayWriter::open(&path, true).await.unwrap();
    writer.write(&json!({"id": "fresh"})).await.unwrap();
    writer.flush().await.unwrap();

    let parsed = read_array(&path).await;
    assert_eq!(parsed.len(), 1);
    assert_eq!(parsed[0]["id"], "fresh");
}

#[tokio::test]
async fn without_preserve_truncates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chat.json");
    tokio::fs::write(&path, "[{\"id\":\"stale\"}\n]").await.unwrap();

    let mut writer = JsonArrayWriter::open(&path, false).await.unwrap();
    writer.write(&json!({"id": "new"})).await.unwrap();
    writer.flush().await.unwrap();

    let parsed = read_array(&path).await;
    assert_eq!(parsed.len(), 1);
    assert_eq!(parsed[0]["id"], "new");
}
