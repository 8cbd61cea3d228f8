// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed exits for the chat pipeline.

use thiserror::Error;
use vtrec_core::VideoStatus;

#[derive(Debug, Error)]
pub enum ChatError {
    /// The watch page reports the video gone (playability `ERROR`).
    #[error("video unavailable: {0}")]
    VideoUnavailable(String),

    /// Playability `LOGIN_REQUIRED`: private or credential-gated.
    #[error("login required: {0}")]
    LoginRequired(String),

    /// Playability `UNPLAYABLE`.
    #[error("video unplayable: {0}")]
    Unplayable(String),

    /// No live-chat renderer on the page. Non-fatal while the broadcast
    /// is still upcoming; fatal on live and past videos.
    #[error("chat is disabled (video is {status})")]
    ChatDisabled { status: VideoStatus },

    /// A past broadcast without a chat replay.
    #[error("no chat replay available: {0}")]
    NoReplay(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed chat payload: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChatError {
    /// Chat-disabled on an upcoming video retries; everything else in the
    /// typed-exit family terminates the capture.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChatError::ChatDisabled { status: VideoStatus::Upcoming })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_disabled_retries_only_while_upcoming() {
        assert!(ChatError::ChatDisabled { status: VideoStatus::Upcoming }.is_retryable());
        assert!(!ChatError::ChatDisabled { status: VideoStatus::Live }.is_retryable());
        assert!(!ChatError::ChatDisabled { status: VideoStatus::Past }.is_retryable());
        assert!(!ChatError::VideoUnavailable("gone".into()).is_retryable());
    }
}
