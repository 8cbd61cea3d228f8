// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Webhook notifier for job state changes.
//!
//! Posts a compact embed payload to the configured webhook. Delivery is
//! fire-and-forget: failures are logged and dropped, never surfaced to
//! the job.

use serde_json::json;
use vtrec_core::{Job, JobStatus};

#[derive(Clone)]
pub struct Notifier {
    http: reqwest::Client,
    webhook_url: Option<String>,
}

fn status_colour(status: JobStatus) -> u32 {
    match status {
        JobStatus::Done => 0x2E_CC71,
        JobStatus::Error => 0xE7_4C3C,
        JobStatus::Cancelled => 0x95_A5A6,
        _ => 0x34_98DB,
    }
}

pub(crate) fn build_payload(job: &Job) -> serde_json::Value {
    let mut description = format!("Status: {}", job.status);
    if let Some(error) = &job.error {
        description.push_str(&format!("\n{error}"));
    }
    json!({
        "embeds": [{
            "title": job.title,
            "description": description,
            "color": status_colour(job.status),
            "fields": [
                {"name": "ID", "value": job.id, "inline": true},
                {"name": "Platform", "value": job.platform.to_string(), "inline": true},
            ],
        }],
    })
}

impl Notifier {
    pub fn new(http: reqwest::Client, webhook_url: Option<String>) -> Self {
        Self { http, webhook_url }
    }

    /// Post a job state change in the background.
    pub fn job_update(&self, job: &Job) {
        let Some(url) = self.webhook_url.clone() else { return };
        let payload = build_payload(job);
        let http = self.http.clone();
        let job_id = job.id.clone();
        tokio::spawn(async move {
            match http.post(&url).json(&payload).send().await {
                Ok(response) if !response.status().is_success() => {
                    tracing::warn!(job_id, status = %response.status(), "webhook rejected notification");
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(job_id, %err, "webhook delivery failed");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_includes_error_text() {
        let mut job = Job::builder().id("abc123").title("stream").build();
        job.fail(JobStatus::Downloading, "io error");
        let payload = build_payload(&job);
        let description = payload["embeds"][0]["description"].as_str().unwrap();
        assert!(description.contains("error"));
        assert!(description.contains("io error"));
        assert_eq!(payload["embeds"][0]["fields"][0]["value"], "abc123");
    }

    #[tokio::test]
    async fn without_url_nothing_happens() {
        let notifier = Notifier::new(reqwest::Client::new(), None);
        notifier.job_update(&Job::builder().build());
    }
}
