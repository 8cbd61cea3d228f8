// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job row and its status state machine.

use crate::platform::Platform;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a job.
///
/// `Done` and `Cancelled` are terminal; `Error` is recoverable via
/// `last_status`, `Cancelled` is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Waiting,
    Preparing,
    Downloading,
    Muxing,
    Uploading,
    Cleaning,
    Done,
    Error,
    Cancelled,
}

crate::simple_display! {
    JobStatus {
        Waiting => "waiting",
        Preparing => "preparing",
        Downloading => "downloading",
        Muxing => "muxing",
        Uploading => "uploading",
        Cleaning => "cleaning",
        Done => "done",
        Error => "error",
        Cancelled => "cancelled",
    }
}

impl JobStatus {
    /// Terminal states are never re-dispatched by the scheduler.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Cancelled)
    }

    /// States that indicate work was in flight when the row was written.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            JobStatus::Preparing
                | JobStatus::Downloading
                | JobStatus::Muxing
                | JobStatus::Uploading
                | JobStatus::Cleaning
        )
    }
}

/// One broadcast to archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Opaque identifier derived from platform + native id. YouTube uses
    /// the bare video id, other platforms are prefixed; the prefix is
    /// authoritative for platform routing.
    pub id: String,
    pub title: String,
    /// Sanitized, platform-suffixed form safe for every supported filesystem.
    pub filename: String,
    /// Opaque quality label (`1080p`, `Unknown`, `XXXp`). Set no later than
    /// entry to muxing for video platforms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    pub channel_id: String,
    #[serde(default)]
    pub member_only: bool,
    /// Scheduled (or actual) start, epoch seconds.
    pub start_time: i64,
    pub platform: Platform,
    pub status: JobStatus,
    /// The state the job was in when it transitioned to `Error`.
    /// Non-nil iff `status == Error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_status: Option<JobStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        filename: impl Into<String>,
        start_time: i64,
        channel_id: impl Into<String>,
        member_only: bool,
    ) -> Self {
        let id = id.into();
        let platform = Platform::from_job_id(&id);
        Self {
            id,
            title: title.into(),
            filename: filename.into(),
            resolution: None,
            channel_id: channel_id.into(),
            member_only,
            start_time,
            platform,
            status: JobStatus::Waiting,
            last_status: None,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to a non-error state, clearing any stale diagnostic.
    pub fn advance(&mut self, status: JobStatus) {
        debug_assert!(status != JobStatus::Error, "use fail() for error transitions");
        self.status = status;
        self.last_status = None;
        self.error = None;
    }

    /// Record a recoverable failure at `stage`. The next scheduler tick
    /// resumes from `last_status`.
    pub fn fail(&mut self, stage: JobStatus, diagnostic: impl Into<String>) {
        self.status = JobStatus::Error;
        self.last_status = Some(stage);
        self.error = Some(diagnostic.into());
    }

    /// Record an unrecoverable failure. Cancelled jobs are never retried.
    pub fn cancel(&mut self, diagnostic: impl Into<String>) {
        self.status = JobStatus::Cancelled;
        self.last_status = None;
        self.error = Some(diagnostic.into());
    }

    /// Stage to resume from when recovering an errored job.
    pub fn recovery_stage(&self) -> Option<JobStatus> {
        if self.status == JobStatus::Error {
            self.last_status.or(Some(JobStatus::Downloading))
        } else {
            None
        }
    }

    /// Eligibility gate: dispatchable once within `grace` seconds of start.
    pub fn is_eligible(&self, now: i64, grace: i64) -> bool {
        now >= self.start_time - grace
    }
}

crate::builder! {
    pub struct JobBuilder => Job {
        into {
            id: String = "abc123",
            title: String = "test stream",
            filename: String = "[2024.1.1.abc123] test stream",
            channel_id: String = "UCtest",
        }
        set {
            member_only: bool = false,
            start_time: i64 = 1_700_000_000,
            platform: Platform = Platform::Youtube,
            status: JobStatus = JobStatus::Waiting,
        }
        option {
            resolution: String = None,
            last_status: JobStatus = None,
            error: String = None,
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
