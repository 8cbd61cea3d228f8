// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire packets and event payloads shared by the websocket hub and the
//! multi-process bridge.

use crate::job::{Job, JobStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One framed event, as sent over websockets and the IPC socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    pub event: String,
    #[serde(default)]
    pub data: Value,
    /// Target session id; `None` broadcasts to every client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

impl Packet {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self { event: event.into(), data, to: None }
    }

    pub fn to(mut self, sid: impl Into<String>) -> Self {
        self.to = Some(sid.into());
        self
    }

    /// Decode a packet from a raw JSON frame. Returns `None` for frames
    /// that are not packet-shaped; callers drop those silently.
    pub fn decode(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}

/// Job snapshot carried by `job_scheduled`, `job_update`, and
/// `connect_job_init` events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPayload {
    pub id: String,
    pub title: String,
    pub filename: String,
    pub start_time: i64,
    pub channel_id: String,
    pub is_member: bool,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Job> for JobPayload {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            title: job.title.clone(),
            filename: job.filename.clone(),
            start_time: job.start_time,
            channel_id: job.channel_id.clone(),
            is_member: job.member_only,
            status: job.status,
            resolution: job.resolution.clone(),
            error: job.error.clone(),
        }
    }
}

/// Payload of `job_delete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDelete {
    pub id: String,
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
