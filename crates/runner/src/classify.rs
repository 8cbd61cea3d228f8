// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-binary line classifiers. Every line is lowercased for matching.

use crate::run::LineVerdict;

/// Classifier for the ytarchive recorder.
///
/// Captures the selected quality token, announces on download start, and
/// fails fast on the recorder's error markers.
pub fn ytarchive_classifier() -> impl FnMut(&str) -> LineVerdict + Send {
    move |line: &str| {
        let lower = line.to_lowercase();
        if lower.contains("selected quality") {
            // "Selected quality: 1080p60 (h264)" → "1080p60"
            let token = line
                .split(": ")
                .nth(1)
                .and_then(|rest| rest.split_whitespace().next())
                .unwrap_or("Unknown")
                .to_string();
            return LineVerdict::Capture(token);
        }
        if lower.contains("error")
            || lower.contains("unable to retrieve")
            || lower.contains("could not find")
            || lower.contains("unable to download")
        {
            return LineVerdict::Fatal(line.to_string());
        }
        if lower.contains("livestream") && lower.contains("process") {
            // Eligible for fallback to the generic extractor.
            return LineVerdict::Fatal(line.to_string());
        }
        if lower.contains("starting download") {
            return LineVerdict::Announce;
        }
        if lower.contains("total downloaded") {
            return LineVerdict::Announce;
        }
        LineVerdict::Progress
    }
}

/// Classifier for ffmpeg-driven downloads.
pub fn ffmpeg_classifier() -> impl FnMut(&str) -> LineVerdict + Send {
    move |line: &str| {
        let lower = line.to_lowercase();
        if lower.contains("press") && lower.contains("stop") {
            return LineVerdict::Announce;
        }
        if lower.contains("io error") {
            return LineVerdict::Fatal(line.to_string());
        }
        LineVerdict::Progress
    }
}

/// Classifier for rclone uploads: error lines are remembered as the
/// diagnostic but do not abort reading.
pub fn rclone_classifier() -> impl FnMut(&str) -> LineVerdict + Send {
    move |line: &str| {
        let lower = line.to_lowercase();
        if lower.contains("error") || lower.contains("failed to copy") {
            return LineVerdict::Diagnostic(line.to_string());
        }
        LineVerdict::Progress
    }
}

/// Post-classification of a recorder diagnostic: private and members-only
/// failures terminate as cancelled, not error.
pub fn is_cancel_diagnostic(diagnostic: &str) -> bool {
    let lower = diagnostic.to_lowercase();
    lower.contains("private") || lower.contains("members only") || lower.contains("members-only")
}

/// The ytarchive failure marker that makes a YouTube job eligible for the
/// generic-extractor fallback.
pub fn is_livestream_fallback(diagnostic: &str) -> bool {
    let lower = diagnostic.to_lowercase();
    lower.contains("livestream") && lower.contains("process")
}

#[cfg(test)]
#[path = "classify_tests.rs"]
mod tests;
