// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cached view of the remote archive: an hourly `rclone lsjson -R` pass
//! folded into a nested tree, persisted so every process can serve
//! `GET /api/records` from the same file.

use crate::env::Config;
use md5::{Digest, Md5};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use vtrec_runner::{run_capture, RunSpec};

const REFRESH_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Only the archive roots are exposed.
pub const VALID_SUBFOLDERS: [&str; 4] = [
    "Chat Archive",
    "Member-Only Chat Archive",
    "Stream Archive",
    "Member-Only Stream Archive",
];

#[derive(Debug, Deserialize)]
pub struct RcloneEntry {
    #[serde(rename = "Path")]
    pub path: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Size", default)]
    pub size: i64,
    #[serde(rename = "MimeType", default)]
    pub mime_type: String,
    #[serde(rename = "ModTime", default)]
    pub mod_time: String,
    #[serde(rename = "IsDir", default)]
    pub is_dir: bool,
}

fn hash_path(path: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(path.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Default)]
struct Folder {
    folders: BTreeMap<String, Folder>,
    files: Vec<Value>,
}

impl Folder {
    fn descend(&mut self, components: &[String]) -> &mut Folder {
        let mut node = self;
        for component in components {
            node = node.folders.entry(component.clone()).or_default();
        }
        node
    }

    fn render(&self, path: &str, name: &str) -> Value {
        let mut children: Vec<Value> = self
            .folders
            .iter()
            .map(|(child_name, child)| {
                child.render(&format!("{path}/{child_name}"), child_name)
            })
            .collect();
        children.extend(self.files.iter().cloned());
        json!({
            "id": hash_path(path),
            "name": name,
            "type": "folder",
            "children": children,
        })
    }
}

/// Fold the flat listing into the nested archive tree.
pub fn build_tree(entries: Vec<RcloneEntry>) -> Value {
    let mut roots: BTreeMap<&str, Folder> = VALID_SUBFOLDERS
        .iter()
        .map(|name| (*name, Folder::default()))
        .collect();

    for entry in entries {
        let components: Vec<String> = entry.path.split('/').map(str::to_string).collect();
        let Some((first, rest)) = components.split_first() else { continue };
        let Some(root) = roots.get_mut(first.as_str()) else { continue };

        if entry.is_dir {
            root.descend(rest);
        } else {
            let Some((_file_name, parents)) = rest.split_last() else { continue };
            root.descend(parents).files.push(json!({
                "id": hash_path(&entry.path),
                "name": entry.name,
                "type": "file",
                "size": entry.size,
                "mimeType": entry.mime_type,
                "modTime": entry.mod_time,
            }));
        }
    }

    let folders: Vec<Value> = roots
        .iter()
        .map(|(name, folder)| folder.render(name, name))
        .collect();
    json!({"folders": folders})
}

/// Periodic records refresh; leader only.
pub struct RecordsTask {
    pub config: Arc<Config>,
}

impl RecordsTask {
    pub async fn run_once(&self) {
        if self.config.rclone_disabled {
            tracing::debug!("uploads disabled, skipping records pass");
            return;
        }
        let Some(target) = self.config.rclone_drive_target.clone() else {
            return;
        };

        let spec = RunSpec::new(&self.config.rclone_path)
            .arg("lsjson")
            .arg("-R")
            .arg(&target);
        let outcome = run_capture(spec).await;
        if outcome.exit_code != 0 {
            tracing::error!(
                exit = outcome.exit_code,
                stderr = %outcome.stderr.trim_end(),
                "rclone lsjson failed"
            );
            return;
        }
        let entries: Vec<RcloneEntry> = match serde_json::from_str(&outcome.stdout) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::error!(%err, "bad rclone listing");
                return;
            }
        };
        let tree = build_tree(entries);

        let tmp = self.config.records_cache_path.with_extension("json.tmp");
        let write = std::fs::write(&tmp, tree.to_string())
            .and_then(|()| std::fs::rename(&tmp, &self.config.records_cache_path));
        match write {
            Ok(()) => tracing::info!("records cache refreshed"),
            Err(err) => tracing::error!(%err, "failed to write records cache"),
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(REFRESH_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.run_once().await,
            }
        }
    }
}

/// Serve the cached tree; an empty object before the first pass.
pub fn read_cache(config: &Config) -> Value {
    std::fs::read(&config.records_cache_path)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .unwrap_or_else(|| json!({"folders": []}))
}

#[cfg(test)]
#[path = "records_tests.rs"]
mod tests;
