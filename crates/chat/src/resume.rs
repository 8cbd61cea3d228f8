// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crash-resume support: recover the last captured message timestamp
//! from a partial transcript.

use serde_json::Value;
use std::io::SeekFrom;
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// How far back the resume scan walks, bytes.
const BACKTRACK_WINDOW: i64 = 5_000;

fn try_parse_tail(tail: &str) -> Option<Vec<Value>> {
    // The tail usually starts mid-element; once it ends at the closing
    // bracket of a complete object, prepending the opening bracket makes
    // it a parseable array.
    let candidate = if tail.ends_with("}\n]") || tail.ends_with("}]") {
        format!("[\n{tail}")
    } else {
        tail.to_string()
    };
    serde_json::from_str(&candidate).ok()
}

/// Walk the final window of the transcript in 1-byte backward increments
/// until a parse succeeds, then return the last element's `timestamp`.
/// `None` means the capture must restart from the beginning.
pub async fn backtrack_last_timestamp(path: &Path) -> Option<i64> {
    let mut file = tokio::fs::File::open(path).await.ok()?;
    let len = file.seek(SeekFrom::End(0)).await.ok()? as i64;
    if len == 0 {
        return None;
    }

    let window = BACKTRACK_WINDOW.min(len);
    let mut offset: i64 = 1;
    while offset <= window {
        file.seek(SeekFrom::End(-offset)).await.ok()?;
        let mut buf = Vec::with_capacity(offset as usize);
        file.read_to_end(&mut buf).await.ok()?;
        let tail = String::from_utf8_lossy(&buf);

        if let Some(parsed) = try_parse_tail(&tail) {
            return parsed
                .last()
                .and_then(|last| last.get("timestamp"))
                .and_then(Value::as_i64);
        }
        offset += 1;
    }
    None
}

#[cfg(test)]
#[path = "resume_tests.rs"]
mod tests;
