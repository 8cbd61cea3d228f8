// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filename sanitization and the dated job filename format.

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use regex::Regex;
use std::sync::OnceLock;

/// Emoji codepoint ranges replaced with `_`.
#[allow(clippy::unwrap_used)] // static pattern, exercised by tests
fn emoji_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            "[\u{1F1E0}-\u{1F1FF}\
\u{1F300}-\u{1F5FF}\
\u{1F600}-\u{1F64F}\
\u{1F680}-\u{1F6FF}\
\u{1F700}-\u{1F77F}\
\u{1F780}-\u{1F7FF}\
\u{1F800}-\u{1F8FF}\
\u{1F900}-\u{1F9FF}\
\u{1FA00}-\u{1FA6F}\
\u{1FA70}-\u{1FAFF}\
\u{2702}-\u{27B0}]",
        )
        .unwrap()
    })
}

/// Substitute characters reserved on common filesystems with full-width
/// equivalents and strip emoji. ASCII alphanumerics, spaces, dots,
/// brackets, and hyphens pass through untouched.
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        match ch {
            '/' => out.push('／'),
            ':' => out.push('：'),
            '<' => out.push('＜'),
            '>' => out.push('＞'),
            '"' => out.push('”'),
            '\'' => out.push('’'),
            '\\' => out.push('＼'),
            '?' => out.push('？'),
            '*' => out.push('⋆'),
            '|' => out.push('｜'),
            '#' => {}
            _ => out.push(ch),
        }
    }
    emoji_pattern().replace_all(&out, "_").into_owned()
}

/// Tokyo offset; JST has no daylight saving.
#[allow(clippy::unwrap_used)] // +09:00 is always in range
fn jst() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).unwrap()
}

/// Build the on-disk job filename: `[YYYY.M.D.<id>] <sanitized title>`
/// with the date rendered in JST.
pub fn build_job_filename(start_time: i64, video_id: &str, title: &str) -> String {
    let utc: DateTime<Utc> = Utc
        .timestamp_opt(start_time, 0)
        .single()
        .unwrap_or_else(|| Utc.timestamp_opt(0, 0).single().unwrap_or_default());
    let as_jst = utc.with_timezone(&jst());
    use chrono::Datelike;
    format!(
        "[{}.{}.{}.{}] {}",
        as_jst.year(),
        as_jst.month(),
        as_jst.day(),
        video_id,
        sanitize_filename(title)
    )
}

#[cfg(test)]
#[path = "filename_tests.rs"]
mod tests;
