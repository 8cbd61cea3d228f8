// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Websocket fan-out hub.
//!
//! A single dispatcher task drains the outgoing queue; each connection
//! owns an ordered send queue, so events to one client are strictly FIFO.
//! A failing client is disconnected without disturbing the others.

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use vtrec_core::{JobPayload, Packet};

/// Keep-alive cadence and pong deadline.
pub const PING_INTERVAL: Duration = Duration::from_secs(20);

/// Per-client send queue depth.
const CLIENT_QUEUE: usize = 256;

struct ClientHandle {
    tx: mpsc::Sender<Packet>,
    cancel: CancellationToken,
}

struct HubInner {
    clients: Mutex<HashMap<String, ClientHandle>>,
    queue_tx: mpsc::Sender<Packet>,
}

/// Clonable handle to the hub.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

impl Hub {
    /// Create the hub and spawn its dispatcher task.
    pub fn new() -> Self {
        let (queue_tx, mut queue_rx) = mpsc::channel::<Packet>(CLIENT_QUEUE);
        let inner = Arc::new(HubInner { clients: Mutex::new(HashMap::new()), queue_tx });

        let dispatch = Arc::clone(&inner);
        tokio::spawn(async move {
            while let Some(packet) = queue_rx.recv().await {
                dispatch_packet(&dispatch, packet);
            }
        });

        Self { inner }
    }

    /// Enqueue an event for every client.
    pub async fn emit(&self, event: &str, data: Value) {
        let _ = self.inner.queue_tx.send(Packet::new(event, data)).await;
    }

    /// Enqueue an event for one client.
    pub async fn emit_to(&self, event: &str, data: Value, sid: &str) {
        let _ = self.inner.queue_tx.send(Packet::new(event, data).to(sid)).await;
    }

    pub fn client_count(&self) -> usize {
        self.inner.clients.lock().len()
    }

    pub(crate) fn register(&self, sid: String) -> (mpsc::Receiver<Packet>, CancellationToken) {
        let (tx, rx) = mpsc::channel(CLIENT_QUEUE);
        let cancel = CancellationToken::new();
        self.inner
            .clients
            .lock()
            .insert(sid, ClientHandle { tx, cancel: cancel.clone() });
        (rx, cancel)
    }

    pub(crate) fn unregister(&self, sid: &str) {
        if let Some(handle) = self.inner.clients.lock().remove(sid) {
            handle.cancel.cancel();
            tracing::info!(sid, "client disconnected");
        }
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

/// Route one packet from the dispatcher. Send failures disconnect only
/// the failing client.
fn dispatch_packet(inner: &Arc<HubInner>, packet: Packet) {
    let mut failed = Vec::new();
    {
        let clients = inner.clients.lock();
        match &packet.to {
            Some(sid) => {
                let Some(handle) = clients.get(sid) else {
                    tracing::warn!(sid, event = %packet.event, "client not found, dropping message");
                    return;
                };
                if handle.tx.try_send(packet.clone()).is_err() {
                    failed.push(sid.clone());
                }
            }
            None => {
                for (sid, handle) in clients.iter() {
                    if handle.tx.try_send(packet.clone()).is_err() {
                        failed.push(sid.clone());
                    }
                }
            }
        }
    }
    for sid in failed {
        tracing::warn!(sid, "send queue stalled, disconnecting client");
        if let Some(handle) = inner.clients.lock().remove(&sid) {
            handle.cancel.cancel();
        }
    }
}

fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn new_sid() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", &id[..5], epoch_ms() / 1000)
}

fn encode(packet: &Packet) -> Message {
    Message::Text(serde_json::to_string(packet).unwrap_or_else(|_| "{}".to_string()))
}

/// Serve one websocket connection: register, send the job snapshot,
/// then run the send queue, keep-alive, and receive loops until any of
/// them ends.
pub async fn serve_client(hub: Hub, socket: WebSocket, init_jobs: Vec<JobPayload>) {
    let sid = new_sid();
    tracing::info!(sid, "client connected");
    let (mut rx, cancel) = hub.register(sid.clone());

    hub.emit_to("connect_job_init", json!(init_jobs), &sid).await;

    let (mut sink, mut stream) = socket.split();
    let last_pong = Arc::new(AtomicU64::new(0));

    // Sender: drains the per-client queue in order. The keep-alive loop
    // routes its pings through the same queue so ordering holds.
    let (raw_tx, mut raw_rx) = mpsc::channel::<Packet>(CLIENT_QUEUE);
    let sender_cancel = cancel.clone();
    let mut sender = tokio::spawn(async move {
        let mut keepalive_failed = false;
        loop {
            tokio::select! {
                biased;
                _ = sender_cancel.cancelled() => break,
                packet = rx.recv() => {
                    let Some(packet) = packet else { break };
                    if sink.send(encode(&packet)).await.is_err() {
                        break;
                    }
                }
                packet = raw_rx.recv() => {
                    let Some(packet) = packet else { keepalive_failed = true; break };
                    if sink.send(encode(&packet)).await.is_err() {
                        break;
                    }
                }
            }
        }
        if keepalive_failed {
            // No pong within the window: abnormal closure.
            let _ = sink
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::ABNORMAL,
                    reason: "keep-alive timeout".into(),
                })))
                .await;
        } else {
            let _ = sink
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::NORMAL,
                    reason: "".into(),
                })))
                .await;
        }
    });

    // Keep-alive: ping every 20 s; a missing pong severs the connection
    // by dropping the raw queue, which the sender reads as the abnormal
    // close signal.
    let ka_sid = sid.clone();
    let ka_pong = Arc::clone(&last_pong);
    let ka_cancel = cancel.clone();
    let keepalive = tokio::spawn(async move {
        loop {
            let sent_at = epoch_ms();
            let ping = Packet::new("ping", json!({"t": sent_at, "sid": ka_sid}));
            if raw_tx.send(ping).await.is_err() {
                break;
            }
            tokio::select! {
                _ = ka_cancel.cancelled() => break,
                _ = tokio::time::sleep(PING_INTERVAL) => {}
            }
            if ka_pong.load(Ordering::Relaxed) < sent_at {
                tracing::info!(sid = %ka_sid, "no pong within window, severing connection");
                break;
            }
        }
        // Dropping raw_tx wakes the sender with the close signal.
    });

    // Receiver: decode frames, track pongs, surface unknown events.
    let rx_sid = sid.clone();
    let rx_pong = Arc::clone(&last_pong);
    let rx_cancel = cancel.clone();
    let mut receiver = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = rx_cancel.cancelled() => break,
                frame = stream.next() => {
                    let Some(Ok(frame)) = frame else { break };
                    match frame {
                        Message::Text(text) => {
                            let Some(packet) = Packet::decode(&text) else { continue };
                            if packet.event == "pong" {
                                if let Some(t) = packet.data.get("t").and_then(Value::as_u64) {
                                    rx_pong.store(t, Ordering::Relaxed);
                                } else {
                                    tracing::warn!(sid = %rx_sid, "pong without timestamp, dropping");
                                }
                            } else {
                                tracing::warn!(sid = %rx_sid, event = %packet.event, "unknown event received");
                            }
                        }
                        Message::Close(_) => break,
                        _ => {}
                    }
                }
            }
        }
    });

    // First loop to fail terminates the client. Keep-alive failure
    // arrives through the sender so the close frame goes out first.
    tokio::select! {
        _ = &mut sender => {}
        _ = &mut receiver => {}
    }
    hub.unregister(&sid);
    sender.abort();
    keepalive.abort();
    receiver.abort();
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;
