// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dataset snapshot and channel lookup.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use vtrec_core::Platform;

/// Dataset errors
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid dataset file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One VTuber row inside a dataset file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetVtuber {
    pub name: String,
    #[serde(default)]
    pub youtube: Option<String>,
    #[serde(default)]
    pub twitch: Option<String>,
    #[serde(default)]
    pub twitcasting: Option<String>,
    #[serde(default)]
    pub mildom: Option<String>,
}

impl DatasetVtuber {
    fn channel_for(&self, platform: Platform) -> Option<&str> {
        match platform {
            Platform::Youtube => self.youtube.as_deref(),
            Platform::Twitch => self.twitch.as_deref(),
            Platform::Twitcasting => self.twitcasting.as_deref(),
            Platform::Mildom => self.mildom.as_deref(),
            // Spaces are keyed by the twitter handle stored as channel id;
            // the dataset does not map them.
            Platform::Twitter => None,
        }
    }
}

/// One dataset file: an organization and its members.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetOrg {
    pub id: String,
    pub name: String,
    pub main_key: String,
    pub upload_base: String,
    pub vliver: Vec<DatasetVtuber>,
}

/// Immutable snapshot of every loaded dataset file, keyed by file stem.
#[derive(Debug, Default)]
pub struct DatasetIndex {
    orgs: BTreeMap<String, DatasetOrg>,
}

/// Readers pin the current snapshot for the duration of one request;
/// the watcher swaps the pointer atomically on reload.
pub type SharedIndex = Arc<RwLock<Arc<DatasetIndex>>>;

impl DatasetIndex {
    /// Load every `*.json` under the dataset directory. Files that fail
    /// to parse are skipped with a log line; a missing directory yields
    /// an empty index.
    pub fn load_dir(dir: &Path) -> Result<Self, DatasetError> {
        let mut orgs = BTreeMap::new();
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(err) => return Err(err.into()),
        };
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if stem.starts_with('_') || stem == "currentversion" {
                continue;
            }
            match Self::load_file(&path) {
                Ok(org) => {
                    orgs.insert(stem.to_string(), org);
                }
                Err(err) => {
                    tracing::error!(path = %path.display(), %err, "invalid dataset file, skipping");
                }
            }
        }
        tracing::info!(count = orgs.len(), "loaded dataset files");
        Ok(Self { orgs })
    }

    pub fn load_file(path: &Path) -> Result<DatasetOrg, DatasetError> {
        let bytes = std::fs::read(path)?;
        serde_json::from_slice(&bytes)
            .map_err(|source| DatasetError::Parse { path: path.to_path_buf(), source })
    }

    pub fn orgs(&self) -> impl Iterator<Item = (&String, &DatasetOrg)> {
        self.orgs.iter()
    }

    pub fn len(&self) -> usize {
        self.orgs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orgs.is_empty()
    }

    /// Replace one org entry (hot reload).
    pub fn with_org(&self, stem: &str, org: DatasetOrg) -> Self {
        let mut orgs = self.orgs.clone();
        orgs.insert(stem.to_string(), org);
        Self { orgs }
    }

    /// Drop one org entry (file deleted).
    pub fn without_org(&self, stem: &str) -> Self {
        let mut orgs = self.orgs.clone();
        orgs.remove(stem);
        Self { orgs }
    }

    /// Find the org and vtuber rows for a channel id on a platform.
    pub fn find(&self, channel_id: &str, platform: Platform) -> Option<(&DatasetOrg, &DatasetVtuber)> {
        for org in self.orgs.values() {
            for vtuber in &org.vliver {
                if vtuber.channel_for(platform) == Some(channel_id) {
                    return Some((org, vtuber));
                }
            }
        }
        None
    }

    /// Upload path segments for a channel: the org's configured upload
    /// base split on separators, then the talent name. Unknown channels
    /// resolve to `["Unknown"]`.
    pub fn upload_segments(&self, channel_id: &str, platform: Platform) -> Vec<String> {
        match self.find(channel_id, platform) {
            Some((org, vtuber)) => {
                let mut segments: Vec<String> = org
                    .upload_base
                    .replace('\\', "/")
                    .split('/')
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
                segments.push(vtuber.name.clone());
                segments
            }
            None => vec!["Unknown".to_string()],
        }
    }
}

/// Wrap a freshly loaded index for sharing.
pub fn shared(index: DatasetIndex) -> SharedIndex {
    Arc::new(RwLock::new(Arc::new(index)))
}

#[cfg(test)]
#[path = "index_tests.rs"]
mod tests;
