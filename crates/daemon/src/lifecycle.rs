// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process startup: directory layout, leader election, and the
//! crash-recovery demotion pass.

use crate::env::Config;
use fs2::FileExt;
use std::fs::File;
use std::io::Write;
use thiserror::Error;
use vtrec_core::JobStatus;
use vtrec_storage::{Store, StoreError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Role within the process group.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RoleKind {
    Leader,
    Follower,
}

/// Held role. The leader keeps the lock file open; dropping it releases
/// the advisory lock so a follower can win the next election.
pub struct Role {
    kind: RoleKind,
    // NOTE(lifetime): held to maintain the exclusive file lock
    #[allow(dead_code)]
    lock_file: Option<File>,
}

impl Role {
    pub fn kind(&self) -> RoleKind {
        self.kind
    }

    pub fn is_leader(&self) -> bool {
        self.kind == RoleKind::Leader
    }
}

/// Create the on-disk layout the daemon expects.
pub fn create_layout(config: &Config) -> Result<(), StartupError> {
    for dir in [
        config.base_dir.clone(),
        config.dataset_dir.clone(),
        config.streamdump_dir.clone(),
        config.chatarchive_dir.clone(),
        config.logs_dir.clone(),
    ] {
        std::fs::create_dir_all(dir)?;
    }
    if let Some(parent) = config.lock_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Try to become the leader via a non-blocking advisory lock on the lock
/// file. The winner writes its pid; losers run as followers.
pub fn elect(config: &Config) -> Result<Role, StartupError> {
    // Avoid truncating before the lock is held; the file may belong to
    // the running leader.
    let file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;

    match file.try_lock_exclusive() {
        Ok(()) => {
            let mut file = file;
            file.set_len(0)?;
            writeln!(file, "{}", std::process::id())?;
            tracing::info!(path = %config.lock_path.display(), "acquired leader lock");
            Ok(Role { kind: RoleKind::Leader, lock_file: Some(file) })
        }
        Err(_) => {
            tracing::info!("leader lock held elsewhere, running as follower");
            Ok(Role { kind: RoleKind::Follower, lock_file: None })
        }
    }
}

/// Demote in-flight rows left behind by a crash to `error` so the normal
/// recovery path resumes them. Crashed `waiting` rows need no help; a
/// crashed in-flight row would otherwise stall forever because recovery
/// only triggers on `error`.
pub fn demote_in_flight(store: &mut Store) -> Result<Vec<String>, StartupError> {
    let mut demoted = Vec::new();
    let in_flight: Vec<(String, JobStatus)> = store
        .jobs()
        .filter(|job| job.status.is_in_flight())
        .map(|job| (job.id.clone(), job.status))
        .collect();

    for (id, stage) in in_flight {
        store.update_job(&id, |job| {
            job.fail(stage, format!("process exited while {stage}"));
        })?;
        tracing::warn!(job_id = %id, stage = %stage, "demoted in-flight job to error for recovery");
        demoted.push(id);
    }
    Ok(demoted)
}

/// Leader shutdown: unlink the IPC socket so followers race cleanly on
/// the next start. The lock releases when the role is dropped.
pub fn shutdown(config: &Config, role: &Role) {
    if role.is_leader() {
        if config.ipc_path.exists() {
            if let Err(err) = std::fs::remove_file(&config.ipc_path) {
                tracing::warn!(%err, "failed to remove IPC socket file");
            }
        }
        if config.lock_path.exists() {
            if let Err(err) = std::fs::remove_file(&config.lock_path) {
                tracing::warn!(%err, "failed to remove lock file");
            }
        }
    }
    tracing::info!("daemon shutdown complete");
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
