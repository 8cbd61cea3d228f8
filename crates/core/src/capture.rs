// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pending chat capture rows.

use serde::{Deserialize, Serialize};

/// A chat capture that outlives its broadcast.
///
/// Created when the capture starts; deleted only after the transcript is
/// uploaded. A surviving row at process start is a crash marker: its
/// on-disk JSON is inspected for the last captured timestamp and the
/// capture resumed from there.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingChatCapture {
    /// The owning job id.
    pub id: String,
    /// Transcript file name under `chatarchive/`.
    pub filename: String,
    pub channel_id: String,
    #[serde(default)]
    pub member_only: bool,
}

impl PendingChatCapture {
    pub fn new(
        id: impl Into<String>,
        filename: impl Into<String>,
        channel_id: impl Into<String>,
        member_only: bool,
    ) -> Self {
        Self {
            id: id.into(),
            filename: filename.into(),
            channel_id: channel_id.into(),
            member_only,
        }
    }
}
