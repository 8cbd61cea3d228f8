// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic refresh of the dataset from its upstream repository.
//!
//! The upstream publishes a hash file and a manifest listing the dataset
//! files. `dataset/currentversion` holds the hash of the copy on disk;
//! when the published hash moves, every listed file is re-downloaded and
//! the version file rewritten.

use crate::index::DatasetError;
use md5::{Digest, Md5};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

const DEFAULT_HASH_URL: &str =
    "https://raw.githubusercontent.com/vtrec/dataset/master/currentversion";
const DEFAULT_MANIFEST_URL: &str =
    "https://raw.githubusercontent.com/vtrec/dataset/master/_manifest.json";
const REFRESH_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Error)]
pub enum UpdaterError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct UpdaterConfig {
    pub dataset_dir: PathBuf,
    pub hash_url: String,
    pub manifest_url: String,
}

impl UpdaterConfig {
    pub fn new(dataset_dir: PathBuf) -> Self {
        Self {
            dataset_dir,
            hash_url: DEFAULT_HASH_URL.to_string(),
            manifest_url: DEFAULT_MANIFEST_URL.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Manifest {
    files: Vec<ManifestFile>,
}

#[derive(Debug, Deserialize)]
struct ManifestFile {
    name: String,
    url: String,
}

/// Dataset refresh task.
pub struct DatasetUpdater {
    config: UpdaterConfig,
    client: reqwest::Client,
}

impl DatasetUpdater {
    pub fn new(config: UpdaterConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    /// MD5 hex of the canonical dataset bytes; mirrors the upstream
    /// pipeline's hashing of the concatenated sorted files.
    pub fn hash_files(contents: &[Vec<u8>]) -> String {
        let mut hasher = Md5::new();
        for bytes in contents {
            hasher.update(bytes);
        }
        format!("{:x}", hasher.finalize())
    }

    async fn remote_hash(&self) -> Result<String, UpdaterError> {
        let text = self
            .client
            .get(&self.config.hash_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(text.lines().next().unwrap_or_default().trim().to_string())
    }

    fn local_hash(&self) -> Option<String> {
        let path = self.config.dataset_dir.join("currentversion");
        let text = std::fs::read_to_string(path).ok()?;
        Some(text.lines().next().unwrap_or_default().trim().to_string())
    }

    async fn refresh(&self, new_hash: &str) -> Result<(), UpdaterError> {
        let manifest: Manifest = self
            .client
            .get(&self.config.manifest_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        std::fs::create_dir_all(&self.config.dataset_dir)?;
        for file in &manifest.files {
            let bytes = self
                .client
                .get(&file.url)
                .send()
                .await?
                .error_for_status()?
                .bytes()
                .await?;
            std::fs::write(self.config.dataset_dir.join(&file.name), &bytes)?;
        }
        std::fs::write(self.config.dataset_dir.join("currentversion"), format!("{new_hash}\n"))?;
        tracing::info!(files = manifest.files.len(), hash = new_hash, "dataset refreshed");
        Ok(())
    }

    /// One updater pass: compare hashes, refresh on mismatch.
    pub async fn run_once(&self) -> Result<(), UpdaterError> {
        let remote = self.remote_hash().await?;
        match self.local_hash() {
            Some(local) if local == remote => {
                tracing::debug!(hash = %remote, "dataset is up to date");
                Ok(())
            }
            Some(local) => {
                tracing::info!(old = %local, new = %remote, "dataset is outdated, refreshing");
                self.refresh(&remote).await
            }
            None => {
                tracing::info!(hash = %remote, "no dataset hash file found, downloading");
                self.refresh(&remote).await
            }
        }
    }

    /// Spawn the hourly refresh loop.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                if let Err(err) = self.run_once().await {
                    tracing::warn!(%err, "dataset updater pass failed");
                }
                tokio::time::sleep(REFRESH_INTERVAL).await;
            }
        })
    }
}

#[cfg(test)]
#[path = "updater_tests.rs"]
mod tests;
