// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! vtrec-chat: live-chat capture pipeline.
//!
//! Long-polls the YouTube chat continuation API alongside a recording,
//! persists messages into an always-valid JSON array, resumes from the
//! last captured timestamp after a crash, and uploads the transcript when
//! the broadcast ends.

mod auth;
mod client;
mod errors;
mod manager;
mod page;
mod parser;
mod resume;
mod uploader;
mod writer;

pub use client::{ChatClient, ChatOutcome};
pub use errors::ChatError;
pub use manager::{ChatCaptureCtx, ChatManager, RcloneCfg};
pub use page::{ChatDetails, ContinuationInfo};
pub use parser::ChatMessage;
pub use resume::backtrack_last_timestamp;
pub use uploader::upload_transcript;
pub use writer::JsonArrayWriter;
