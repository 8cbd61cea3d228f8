// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::writer::JsonArrayWriter;
use serde_json::json;

#[tokio::test]
async fn recovers_last_timestamp_from_written_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chat.json");
    let mut writer = JsonArrayWriter::open(&path, false).await.unwrap();
    for ts in [1_700_000_000_000_000i64, 1_700_000_111_000_000, 1_700_000_123_456_000] {
        writer.write(&json!({"id": format!("m{ts}"), "timestamp": ts})).await.unwrap();
    }
    writer.close().await.unwrap();

    let last = backtrack_last_timestamp(&path).await;
    assert_eq!(last, Some(1_700_000_123_456_000));
}

#[tokio::test]
async fn large_file_only_scans_tail() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chat.json");
    let mut writer = JsonArrayWriter::open(&path, false).await.unwrap();
    // Enough elements to push the head of the file well past the window.
    for i in 0..500i64 {
        writer
            .write(&json!({
                "id": format!("msg-{i}"),
                "timestamp": 1_700_000_000_000_000 + i,
                "message": "padding padding padding padding",
            }))
            .await
            .unwrap();
    }
    writer.close().await.unwrap();

    let last = backtrack_last_timestamp(&path).await;
    assert_eq!(last, Some(1_700_000_000_000_499));
}

#[tokio::test]
async fn missing_file_is_none() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(backtrack_last_timestamp(&dir.path().join("nope.json")).await, None);
}

#[tokio::test]
async fn empty_file_is_none() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chat.json");
    tokio::fs::write(&path, b"").await.unwrap();
    assert_eq!(backtrack_last_timestamp(&path).await, None);
}

#[tokio::test]
async fn garbage_without_parse_is_none() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chat.json");
    tokio::fs::write(&path, b"this is not json at all").await.unwrap();
    assert_eq!(backtrack_last_timestamp(&path).await, None);
}

#[tokio::test]
async fn element_without_timestamp_is_none() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chat.json");
    let mut writer = JsonArrayWriter::open(&path, false).await.unwrap();
    writer.write(&json!({"id": "no-ts"})).await.unwrap();
    writer.close().await.unwrap();
    assert_eq!(backtrack_last_timestamp(&path).await, None);
}
