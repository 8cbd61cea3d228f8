// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use std::time::Duration;

#[test]
fn frames_round_trip_through_scanner() {
    let framed = encode_frame(b"{\"event\":\"x\"}");
    assert!(framed.ends_with(FRAME_EOT));
    assert_eq!(&framed[..framed.len() - 3], b"{\"event\":\"x\"}");
}

#[tokio::test]
async fn frame_reader_splits_concatenated_frames() {
    let mut bytes = encode_frame(b"first");
    bytes.extend_from_slice(&encode_frame(b"second"));
    let mut reader = FrameReader::new(std::io::Cursor::new(bytes));

    assert_eq!(reader.read_frame().await.unwrap(), b"first");
    assert_eq!(reader.read_frame().await.unwrap(), b"second");
    assert!(matches!(
        reader.read_frame().await,
        Err(BridgeError::RemoteDisconnected)
    ));
}

#[tokio::test]
async fn frame_reader_handles_partial_chunks() {
    // A frame delivered one byte at a time still assembles.
    let framed = encode_frame(br#"{"event":"job_update","data":{"id":"a"}}"#);
    let mut reader = FrameReader::new(std::io::Cursor::new(framed.clone()));
    let frame = reader.read_frame().await.unwrap();
    let packet = Packet::decode(std::str::from_utf8(&frame).unwrap()).unwrap();
    assert_eq!(packet.event, "job_update");
}

async fn start_server(dir: &std::path::Path) -> (IpcServer, PathBuf, CancellationToken) {
    let path = dir.join("vtrec-ipc.sock");
    let listener = IpcServer::bind(&path).unwrap();
    let server = IpcServer::new();
    let cancel = CancellationToken::new();
    tokio::spawn(server.clone().run(listener, cancel.clone()));
    (server, path, cancel)
}

#[tokio::test]
async fn handshake_then_ws_event_reaches_follower_hub() {
    let dir = tempfile::tempdir().unwrap();
    let (server, path, cancel) = start_server(dir.path()).await;

    let hub = Hub::new();
    let (mut client_rx, _cc) = hub.register("local-client".to_string());
    let follower = IpcClient::new(path, hub);
    let follower_cancel = cancel.child_token();
    tokio::spawn(follower.run(follower_cancel));

    // Wait for the handshake to complete.
    for _ in 0..50 {
        if server.connection_count() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(server.connection_count(), 1);

    server.emit_ws("job_update", json!({"id": "abc123", "status": "DOWNLOADING"}));

    let packet = tokio::time::timeout(Duration::from_secs(2), client_rx.recv())
        .await
        .unwrap()
        .unwrap();
    // The follower strips the ws_ prefix before re-emitting.
    assert_eq!(packet.event, "job_update");
    assert_eq!(packet.data["id"], "abc123");

    cancel.cancel();
}

#[tokio::test]
async fn server_drops_silent_peer() {
    let dir = tempfile::tempdir().unwrap();
    let (server, path, cancel) = start_server(dir.path()).await;

    // Connect but never answer the hello.
    let _stream = UnixStream::connect(&path).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.connection_count(), 0);

    cancel.cancel();
}

#[tokio::test]
async fn bind_removes_stale_socket_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vtrec-ipc.sock");
    std::fs::write(&path, b"stale").unwrap();
    let _listener = IpcServer::bind(&path).unwrap();
}
