// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event fan-out shared by the engine, the autoscheduler, and the HTTP
//! handlers: local websocket clients first, then every follower over the
//! bridge.

use crate::ipc::IpcServer;
use crate::ws::Hub;
use serde_json::Value;
use vtrec_core::{Job, JobDelete, JobPayload};

#[derive(Clone)]
pub struct Broadcaster {
    hub: Hub,
    /// Present only on the leader; followers never originate events.
    ipc: Option<IpcServer>,
}

impl Broadcaster {
    pub fn new(hub: Hub, ipc: Option<IpcServer>) -> Self {
        Self { hub, ipc }
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Emit an event to local clients and, on the leader, to every
    /// follower process.
    pub async fn emit(&self, event: &str, data: Value) {
        self.hub.emit(event, data.clone()).await;
        if let Some(ipc) = &self.ipc {
            ipc.emit_ws(event, data);
        }
    }

    pub async fn job_scheduled(&self, job: &Job) {
        let payload = serde_json::to_value(JobPayload::from(job)).unwrap_or(Value::Null);
        self.emit("job_scheduled", payload).await;
    }

    pub async fn job_update(&self, job: &Job) {
        let payload = serde_json::to_value(JobPayload::from(job)).unwrap_or(Value::Null);
        self.emit("job_update", payload).await;
    }

    pub async fn job_delete(&self, id: &str) {
        let payload =
            serde_json::to_value(JobDelete { id: id.to_string() }).unwrap_or(Value::Null);
        self.emit("job_delete", payload).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vtrec_core::JobStatus;

    #[tokio::test]
    async fn job_update_carries_full_payload() {
        let hub = Hub::new();
        let (mut rx, _cancel) = hub.register("c".to_string());
        let broadcaster = Broadcaster::new(hub, None);

        let mut job = Job::builder().id("abc123").build();
        job.advance(JobStatus::Downloading);
        broadcaster.job_update(&job).await;

        let packet = rx.recv().await.unwrap();
        assert_eq!(packet.event, "job_update");
        assert_eq!(packet.data["id"], "abc123");
        assert_eq!(packet.data["status"], "DOWNLOADING");
    }

    #[tokio::test]
    async fn delete_event_is_id_only() {
        let hub = Hub::new();
        let (mut rx, _cancel) = hub.register("c".to_string());
        let broadcaster = Broadcaster::new(hub, None);

        broadcaster.job_delete("gone").await;
        let packet = rx.recv().await.unwrap();
        assert_eq!(packet.event, "job_delete");
        assert_eq!(packet.data, serde_json::json!({"id": "gone"}));
    }
}
