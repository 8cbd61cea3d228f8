// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Multi-process bridge over a unix-domain socket.
//!
//! The leader listens; followers connect. Frames are UTF-8 JSON packets
//! terminated by `0x04 0x04 0x04` (ASCII EOT thrice, which cannot appear
//! inside a JSON payload). The leader emits `ws_<event>` packets to every
//! connection; each follower strips the prefix and re-emits the inner
//! event to its own websocket clients.

use crate::ws::Hub;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use vtrec_core::Packet;

/// Frame terminator: ASCII End-of-Transmission repeated thrice.
pub const FRAME_EOT: &[u8; 3] = b"\x04\x04\x04";

/// Handshake read deadline.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Follower reconnect backoff.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

const CONN_QUEUE: usize = 256;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("remote connection closed")]
    RemoteDisconnected,

    #[error("handshake failed: {0}")]
    Handshake(String),
}

/// Append a framed payload.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(payload.len() + FRAME_EOT.len());
    framed.extend_from_slice(payload);
    framed.extend_from_slice(FRAME_EOT);
    framed
}

/// Incremental frame scanner over a byte stream.
pub struct FrameReader<R> {
    reader: R,
    buffer: Vec<u8>,
}

impl<R: AsyncReadExt + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, buffer: Vec::with_capacity(4096) }
    }

    fn take_frame(&mut self) -> Option<Vec<u8>> {
        let pos = self
            .buffer
            .windows(FRAME_EOT.len())
            .position(|window| window == FRAME_EOT)?;
        let frame = self.buffer[..pos].to_vec();
        self.buffer.drain(..pos + FRAME_EOT.len());
        Some(frame)
    }

    /// Read until one full frame is available. EOF or a connection reset
    /// maps to [`BridgeError::RemoteDisconnected`].
    pub async fn read_frame(&mut self) -> Result<Vec<u8>, BridgeError> {
        loop {
            if let Some(frame) = self.take_frame() {
                return Ok(frame);
            }
            let mut chunk = [0u8; 4096];
            let n = self.reader.read(&mut chunk).await.map_err(|err| {
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::ConnectionReset
                ) {
                    BridgeError::RemoteDisconnected
                } else {
                    BridgeError::Io(err)
                }
            })?;
            if n == 0 {
                return Err(BridgeError::RemoteDisconnected);
            }
            self.buffer.extend_from_slice(&chunk[..n]);
        }
    }
}

fn conn_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    let epoch = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("ipc-{}-{}", &id[..5], epoch)
}

struct ConnHandle {
    tx: mpsc::Sender<Packet>,
    cancel: CancellationToken,
}

/// Leader side: accepts follower connections and fans events out to all
/// of them.
#[derive(Clone)]
pub struct IpcServer {
    conns: Arc<Mutex<HashMap<String, ConnHandle>>>,
}

impl IpcServer {
    pub fn new() -> Self {
        Self { conns: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// Bind the socket, removing a stale file from a previous run.
    pub fn bind(path: &PathBuf) -> Result<UnixListener, BridgeError> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(UnixListener::bind(path)?)
    }

    /// Broadcast one event to every connected follower, prefixed for
    /// websocket re-emission.
    pub fn emit_ws(&self, event: &str, data: Value) {
        let packet = Packet::new(format!("ws_{event}"), data);
        let mut failed = Vec::new();
        {
            let conns = self.conns.lock();
            for (id, handle) in conns.iter() {
                if handle.tx.try_send(packet.clone()).is_err() {
                    failed.push(id.clone());
                }
            }
        }
        for id in failed {
            tracing::warn!(conn = %id, "IPC send queue stalled, dropping connection");
            if let Some(handle) = self.conns.lock().remove(&id) {
                handle.cancel.cancel();
            }
        }
    }

    pub fn connection_count(&self) -> usize {
        self.conns.lock().len()
    }

    /// Accept loop. One receiver and one sender task per connection.
    pub async fn run(self, listener: UnixListener, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, _)) => {
                            let server = self.clone();
                            let conn_cancel = cancel.child_token();
                            tokio::spawn(async move {
                                if let Err(err) = server.handle_connection(stream, conn_cancel).await {
                                    tracing::debug!(%err, "IPC connection ended");
                                }
                            });
                        }
                        Err(err) => tracing::error!(%err, "IPC accept error"),
                    }
                }
            }
        }
        for (_, handle) in self.conns.lock().drain() {
            handle.cancel.cancel();
        }
    }

    async fn handle_connection(
        &self,
        stream: UnixStream,
        cancel: CancellationToken,
    ) -> Result<(), BridgeError> {
        let id = conn_id();
        tracing::info!(conn = %id, "new IPC connection");
        let (read_half, mut write_half) = stream.into_split();
        let mut frames = FrameReader::new(read_half);

        // Handshake: we greet, the peer must answer within the deadline.
        write_half.write_all(&encode_frame(b"hello")).await?;
        let answer = tokio::time::timeout(HANDSHAKE_TIMEOUT, frames.read_frame())
            .await
            .map_err(|_| BridgeError::Handshake("no hi within timeout".to_string()))??;
        if answer != b"hi" {
            return Err(BridgeError::Handshake(format!(
                "unexpected greeting ({} bytes)",
                answer.len()
            )));
        }

        let (tx, mut rx) = mpsc::channel::<Packet>(CONN_QUEUE);
        self.conns
            .lock()
            .insert(id.clone(), ConnHandle { tx, cancel: cancel.clone() });

        // Writes are serialized by draining a single queue per
        // connection.
        let result = loop {
            tokio::select! {
                _ = cancel.cancelled() => break Ok(()),
                packet = rx.recv() => {
                    let Some(packet) = packet else { break Ok(()) };
                    let encoded = match serde_json::to_vec(&packet) {
                        Ok(bytes) => bytes,
                        Err(err) => {
                            tracing::error!(%err, "failed to encode IPC packet");
                            continue;
                        }
                    };
                    if let Err(err) = write_half.write_all(&encode_frame(&encoded)).await {
                        break Err(BridgeError::Io(err));
                    }
                }
                frame = frames.read_frame() => {
                    match frame {
                        // Followers do not originate events today; drain
                        // and ignore so the socket stays healthy.
                        Ok(frame) => {
                            tracing::debug!(conn = %id, bytes = frame.len(), "IPC frame from follower");
                        }
                        Err(err) => break Err(err),
                    }
                }
            }
        };

        if let Some(handle) = self.conns.lock().remove(&id) {
            handle.cancel.cancel();
        }
        tracing::info!(conn = %id, "IPC connection closed");
        result.or(Ok(()))
    }
}

impl Default for IpcServer {
    fn default() -> Self {
        Self::new()
    }
}

/// Follower side: connect to the leader's socket, handshake, then
/// re-emit every `ws_`-prefixed event to the local hub.
pub struct IpcClient {
    path: PathBuf,
    hub: Hub,
}

impl IpcClient {
    pub fn new(path: PathBuf, hub: Hub) -> Self {
        Self { path, hub }
    }

    /// Connect-and-reconnect loop.
    pub async fn run(self, cancel: CancellationToken) {
        loop {
            if cancel.is_cancelled() {
                break;
            }
            if !self.path.exists() {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(RECONNECT_DELAY) => continue,
                }
            }
            match UnixStream::connect(&self.path).await {
                Ok(stream) => {
                    tracing::info!(path = %self.path.display(), "connected to IPC leader");
                    if let Err(err) = self.serve(stream, &cancel).await {
                        tracing::warn!(%err, "IPC client connection lost");
                    }
                }
                Err(err) => {
                    tracing::debug!(%err, "IPC connect failed, retrying");
                }
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(RECONNECT_DELAY) => {}
            }
        }
    }

    async fn serve(&self, stream: UnixStream, cancel: &CancellationToken) -> Result<(), BridgeError> {
        let (read_half, mut write_half) = stream.into_split();
        let mut frames = FrameReader::new(read_half);

        let greeting = tokio::time::timeout(HANDSHAKE_TIMEOUT, frames.read_frame())
            .await
            .map_err(|_| BridgeError::Handshake("no hello within timeout".to_string()))??;
        if greeting != b"hello" {
            return Err(BridgeError::Handshake("unexpected server greeting".to_string()));
        }
        write_half.write_all(&encode_frame(b"hi")).await?;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                frame = frames.read_frame() => {
                    let frame = frame?;
                    let Ok(text) = std::str::from_utf8(&frame) else { continue };
                    let Some(packet) = Packet::decode(text) else { continue };
                    if let Some(event) = packet.event.strip_prefix("ws_") {
                        tracing::debug!(event, "rebroadcasting IPC event to local clients");
                        self.hub.emit(event, packet.data).await;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "ipc_tests.rs"]
mod tests;
