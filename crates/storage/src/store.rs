// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot-style JSON persistence for jobs, rules, and chat captures.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use vtrec_core::{AutoRule, Job, PendingChatCapture};

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt store file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// On-disk document shape.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    jobs: BTreeMap<String, Job>,
    #[serde(default)]
    auto_rules: Vec<AutoRule>,
    #[serde(default)]
    next_rule_id: u64,
    #[serde(default)]
    chat_captures: BTreeMap<String, PendingChatCapture>,
}

/// The job store. Every mutation persists before returning.
#[derive(Debug)]
pub struct Store {
    path: PathBuf,
    data: StoreData,
}

impl Store {
    /// Open the store, creating an empty one if the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let data = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|source| StoreError::Corrupt { path: path.clone(), source })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => StoreData::default(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self { path, data })
    }

    /// Persist via temp file + atomic rename so readers never observe a
    /// torn document.
    fn persist(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(&self.data)?;
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // ---------------------------------------------------------------
    // Jobs
    // ---------------------------------------------------------------

    pub fn job(&self, id: &str) -> Option<&Job> {
        self.data.jobs.get(id)
    }

    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.data.jobs.values()
    }

    /// Jobs the scheduler still has work for.
    pub fn non_terminal_jobs(&self) -> Vec<Job> {
        self.data
            .jobs
            .values()
            .filter(|job| !job.is_terminal())
            .cloned()
            .collect()
    }

    pub fn job_ids(&self) -> Vec<String> {
        self.data.jobs.keys().cloned().collect()
    }

    /// Insert or replace a job row.
    pub fn upsert_job(&mut self, job: Job) -> Result<(), StoreError> {
        self.data.jobs.insert(job.id.clone(), job);
        self.persist()
    }

    /// Apply a mutation to a job row and persist. Returns the updated
    /// row, or `None` when the id is unknown.
    pub fn update_job<F>(&mut self, id: &str, mutate: F) -> Result<Option<Job>, StoreError>
    where
        F: FnOnce(&mut Job),
    {
        let Some(job) = self.data.jobs.get_mut(id) else {
            return Ok(None);
        };
        mutate(job);
        let updated = job.clone();
        self.persist()?;
        Ok(Some(updated))
    }

    pub fn delete_job(&mut self, id: &str) -> Result<Option<Job>, StoreError> {
        let removed = self.data.jobs.remove(id);
        if removed.is_some() {
            self.persist()?;
        }
        Ok(removed)
    }

    // ---------------------------------------------------------------
    // Autoscheduler rules
    // ---------------------------------------------------------------

    pub fn rules(&self) -> &[AutoRule] {
        &self.data.auto_rules
    }

    pub fn rule(&self, id: u64) -> Option<&AutoRule> {
        self.data.auto_rules.iter().find(|rule| rule.id == id)
    }

    /// Insert a rule, assigning the next monotonic id. Returns the stored
    /// rule with its id filled in.
    pub fn insert_rule(&mut self, mut rule: AutoRule) -> Result<AutoRule, StoreError> {
        self.data.next_rule_id += 1;
        rule.id = self.data.next_rule_id;
        self.data.auto_rules.push(rule.clone());
        self.persist()?;
        Ok(rule)
    }

    pub fn update_rule<F>(&mut self, id: u64, mutate: F) -> Result<Option<AutoRule>, StoreError>
    where
        F: FnOnce(&mut AutoRule),
    {
        let Some(rule) = self.data.auto_rules.iter_mut().find(|rule| rule.id == id) else {
            return Ok(None);
        };
        mutate(rule);
        let updated = rule.clone();
        self.persist()?;
        Ok(Some(updated))
    }

    pub fn delete_rule(&mut self, id: u64) -> Result<Option<AutoRule>, StoreError> {
        let before = self.data.auto_rules.len();
        let removed = self
            .data
            .auto_rules
            .iter()
            .position(|rule| rule.id == id)
            .map(|idx| self.data.auto_rules.remove(idx));
        if self.data.auto_rules.len() != before {
            self.persist()?;
        }
        Ok(removed)
    }

    // ---------------------------------------------------------------
    // Pending chat captures
    // ---------------------------------------------------------------

    pub fn chat_captures(&self) -> Vec<PendingChatCapture> {
        self.data.chat_captures.values().cloned().collect()
    }

    pub fn chat_capture(&self, id: &str) -> Option<&PendingChatCapture> {
        self.data.chat_captures.get(id)
    }

    /// Insert a capture row if absent; returns the stored row either way.
    pub fn ensure_chat_capture(
        &mut self,
        capture: PendingChatCapture,
    ) -> Result<PendingChatCapture, StoreError> {
        if let Some(existing) = self.data.chat_captures.get(&capture.id) {
            return Ok(existing.clone());
        }
        self.data.chat_captures.insert(capture.id.clone(), capture.clone());
        self.persist()?;
        Ok(capture)
    }

    pub fn delete_chat_capture(&mut self, id: &str) -> Result<Option<PendingChatCapture>, StoreError> {
        let removed = self.data.chat_captures.remove(id);
        if removed.is_some() {
            self.persist()?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
