// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! vtrec-runner: uniform launcher for the wrapped recorder, muxer, and
//! uploader binaries.
//!
//! Children are scanned line-by-line through a caller-supplied classifier
//! while every pipe is drained continuously, so a chatty child can never
//! deadlock on a full buffer.

mod classify;
mod run;

pub use classify::{
    ffmpeg_classifier, is_cancel_diagnostic, is_livestream_fallback, rclone_classifier,
    ytarchive_classifier,
};
pub use run::{
    run_capture, run_collect, run_scanned, CaptureOutcome, LineVerdict, RunOutcome, RunSpec,
    RunnerSignal, StreamSel, SPAWN_BLOCKED_CODE,
};
