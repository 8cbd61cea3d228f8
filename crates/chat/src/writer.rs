// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Incremental JSON-array writer.
//!
//! The file always ends with `\n]`, so it parses as a complete array at
//! every flush boundary. Appending seeks to the end, rewinds two bytes
//! over the closing `\n]`, splices `", "` plus the new indented object,
//! and rewrites the terminator.

use serde::Serialize;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

pub struct JsonArrayWriter {
    file: File,
    path: PathBuf,
    closed: bool,
}

fn indent_lines(text: &str) -> String {
    text.lines()
        .map(|line| format!("  {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Recover the elements of a possibly torn transcript.
///
/// A crash can leave a partial trailing write after the last complete
/// element. When the whole document no longer parses, walk backward over
/// the tail, re-closing the array at each point that ends on a complete
/// object, until a parse succeeds. Only the torn trailing write is lost;
/// every complete element survives.
pub(crate) fn recover_array_prefix(existing: &[u8]) -> Vec<serde_json::Value> {
    if let Ok(parsed) = serde_json::from_slice(existing) {
        return parsed;
    }
    let text = String::from_utf8_lossy(existing);
    for end in (1..=text.len()).rev() {
        if !text.is_char_boundary(end) {
            continue;
        }
        let prefix = text[..end].trim_end();
        if !prefix.ends_with('}') {
            continue;
        }
        let candidate = format!("{prefix}\n]");
        if let Ok(parsed) = serde_json::from_str::<Vec<serde_json::Value>>(&candidate) {
            return parsed;
        }
    }
    Vec::new()
}

impl JsonArrayWriter {
    /// Open the writer. With `preserve` set, the pre-existing array is
    /// re-written element by element so the on-disk format is normalized
    /// before appending; a torn tail loses only the partial trailing
    /// write, never the captured elements before it.
    pub async fn open(path: impl Into<PathBuf>, preserve: bool) -> std::io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .await?;

        let mut previous: Vec<serde_json::Value> = Vec::new();
        if preserve {
            let mut existing = Vec::new();
            file.read_to_end(&mut existing).await?;
            if !existing.is_empty() {
                previous = recover_array_prefix(&existing);
            }
        }

        file.set_len(0).await?;
        file.seek(SeekFrom::Start(0)).await?;

        let mut writer = Self { file, path, closed: false };
        for item in &previous {
            writer.write(item).await?;
        }
        Ok(writer)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one element, keeping the document valid.
    pub async fn write<T: Serialize>(&mut self, item: &T) -> std::io::Result<()> {
        let rendered = serde_json::to_string_pretty(item)?;
        let body = format!("\n{}", indent_lines(&rendered));

        let end = self.file.seek(SeekFrom::End(0)).await?;
        if end == 0 {
            self.file.write_all(b"[").await?;
        } else {
            self.file.seek(SeekFrom::End(-2)).await?;
            self.file.write_all(b", ").await?;
        }
        self.file.write_all(body.as_bytes()).await?;
        self.file.write_all(b"\n]").await?;
        Ok(())
    }

    pub async fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush().await
    }

    pub async fn close(&mut self) -> std::io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.file.flush().await?;
        self.file.sync_all().await
    }
}

#[cfg(test)]
#[path = "writer_tests.rs"]
mod tests;
