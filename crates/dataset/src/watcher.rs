// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hot reload of the dataset directory.
//!
//! A notify watcher feeds file events into an async task that rebuilds
//! the affected org entry and swaps the shared snapshot. Readers holding
//! the previous `Arc` keep a consistent view.

use crate::index::{DatasetIndex, SharedIndex};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

fn json_stem(path: &Path) -> Option<String> {
    if path.extension().and_then(|e| e.to_str()) != Some("json") {
        return None;
    }
    let stem = path.file_stem().and_then(|s| s.to_str())?;
    if stem.starts_with('_') {
        return None;
    }
    Some(stem.to_string())
}

/// Spawn the dataset watcher. The spawned task owns the notify watcher;
/// aborting the task stops the reload loop.
pub fn spawn_watcher(dataset_dir: PathBuf, shared: SharedIndex) -> JoinHandle<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Event>();

    tokio::spawn(async move {
        let mut watcher = match notify::recommended_watcher(move |res: notify::Result<Event>| {
            if let Ok(event) = res {
                let _ = tx.send(event);
            }
        }) {
            Ok(watcher) => watcher,
            Err(err) => {
                tracing::error!(%err, "failed to create dataset watcher");
                return;
            }
        };
        if let Err(err) = watcher.watch(&dataset_dir, RecursiveMode::NonRecursive) {
            tracing::error!(path = %dataset_dir.display(), %err, "failed to watch dataset dir");
            return;
        }
        tracing::info!(path = %dataset_dir.display(), "watching dataset folder");

        while let Some(event) = rx.recv().await {
            if !matches!(
                event.kind,
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
            ) {
                continue;
            }
            for path in &event.paths {
                let Some(stem) = json_stem(path) else { continue };
                let current = { shared.read().clone() };
                let next = if matches!(event.kind, EventKind::Remove(_)) || !path.exists() {
                    tracing::info!(dataset = %stem, "dataset file removed, dropping entry");
                    current.without_org(&stem)
                } else {
                    match DatasetIndex::load_file(path) {
                        Ok(org) => {
                            tracing::info!(dataset = %stem, "reloading dataset entry");
                            current.with_org(&stem, org)
                        }
                        Err(err) => {
                            // Parse errors keep the previous snapshot.
                            tracing::error!(path = %path.display(), %err, "invalid dataset file");
                            continue;
                        }
                    }
                };
                *shared.write() = Arc::new(next);
            }
        }
    })
}
