// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job lifecycle engine.
//!
//! Runs only on the leader. Each tick enumerates non-terminal jobs and
//! dispatches every eligible one to an independent supervised task that
//! drives the state machine:
//!
//! `waiting → preparing → downloading → muxing → uploading → cleaning → done`
//!
//! A stage failure parks the job in `error` with `last_status` naming
//! the stage; the next tick resumes from there. Fatal classifications
//! (private, members-only without cookies, geo, captcha) terminate as
//! `cancelled` and are never retried.

mod stages;

use crate::broadcast::Broadcaster;
use crate::env::Config;
use crate::notifier::Notifier;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use vtrec_chat::ChatManager;
use vtrec_core::{Clock, Job, JobStatus};
use vtrec_dataset::SharedIndex;
use vtrec_storage::Store;

pub(crate) use stages::{PipelineState, StageOutcome};

/// Everything a job task needs.
#[derive(Clone)]
pub struct EngineCtx<C: Clock> {
    pub config: Arc<Config>,
    pub store: Arc<Mutex<Store>>,
    pub dataset: SharedIndex,
    pub broadcaster: Broadcaster,
    pub notifier: Notifier,
    pub chat: Arc<ChatManager>,
    pub http: reqwest::Client,
    pub clock: C,
}

impl<C: Clock> EngineCtx<C> {
    /// Persist a status transition and fan the update out.
    pub(crate) async fn set_status(&self, job: &mut Job, status: JobStatus) {
        match self.store.lock().update_job(&job.id, |row| row.advance(status)) {
            Ok(Some(updated)) => *job = updated,
            Ok(None) => {
                tracing::warn!(job_id = %job.id, "job row vanished mid-pipeline");
                job.advance(status);
            }
            Err(err) => {
                tracing::error!(job_id = %job.id, %err, "failed to persist status transition");
                job.advance(status);
            }
        }
        self.broadcaster.job_update(job).await;
        self.notifier.job_update(job);
    }

    /// Persist a captured resolution label.
    pub(crate) async fn set_resolution(&self, job: &mut Job, resolution: String) {
        tracing::info!(job_id = %job.id, resolution = %resolution, "selected quality");
        match self
            .store
            .lock()
            .update_job(&job.id, |row| row.resolution = Some(resolution.clone()))
        {
            Ok(Some(updated)) => *job = updated,
            Ok(None) => job.resolution = Some(resolution),
            Err(err) => {
                tracing::error!(job_id = %job.id, %err, "failed to persist resolution");
                job.resolution = Some(resolution);
            }
        }
        self.broadcaster.job_update(job).await;
    }

    pub(crate) async fn fail_job(&self, job: &mut Job, stage: JobStatus, diagnostic: String) {
        tracing::error!(job_id = %job.id, stage = %stage, diagnostic = %diagnostic, "job failed");
        match self
            .store
            .lock()
            .update_job(&job.id, |row| row.fail(stage, diagnostic.clone()))
        {
            Ok(Some(updated)) => *job = updated,
            _ => job.fail(stage, diagnostic),
        }
        self.broadcaster.job_update(job).await;
        self.notifier.job_update(job);
    }

    pub(crate) async fn cancel_job(&self, job: &mut Job, diagnostic: String) {
        tracing::warn!(job_id = %job.id, diagnostic = %diagnostic, "job cancelled");
        match self
            .store
            .lock()
            .update_job(&job.id, |row| row.cancel(diagnostic.clone()))
        {
            Ok(Some(updated)) => *job = updated,
            _ => job.cancel(diagnostic),
        }
        self.broadcaster.job_update(job).await;
        self.notifier.job_update(job);
    }
}

/// The engine: a ticker plus a registry of running job tasks.
pub struct Engine<C: Clock + 'static> {
    ctx: EngineCtx<C>,
    tasks: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
    cancel: CancellationToken,
}

impl<C: Clock + 'static> Engine<C> {
    pub fn new(ctx: EngineCtx<C>, cancel: CancellationToken) -> Self {
        Self { ctx, tasks: Arc::new(Mutex::new(HashMap::new())), cancel }
    }

    /// One tick: reap finished tasks, then dispatch every non-terminal
    /// job that does not already have a running task. At most one active
    /// task per job id.
    pub async fn tick(&self) {
        self.tasks.lock().retain(|_, handle| !handle.is_finished());

        let jobs = self.ctx.store.lock().non_terminal_jobs();
        if jobs.is_empty() {
            tracing::debug!("no scheduled jobs found");
            return;
        }
        for job in jobs {
            {
                let tasks = self.tasks.lock();
                if tasks.contains_key(&job.id) {
                    tracing::debug!(job_id = %job.id, "task already running, skipping");
                    continue;
                }
            }
            let ctx = self.ctx.clone();
            let cancel = self.cancel.child_token();
            let id = job.id.clone();
            tracing::debug!(job_id = %id, status = %job.status, "dispatching job task");
            let handle = tokio::spawn(async move {
                executor(ctx, job, cancel).await;
            });
            self.tasks.lock().insert(id, handle);
        }
    }

    pub fn active_tasks(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Periodic loop, leader only.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.ctx.config.downloader_tick);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => self.tick().await,
            }
        }
        tracing::info!("lifecycle engine stopped, cancelling running tasks");
        for (_, handle) in self.tasks.lock().drain() {
            handle.abort();
        }
    }
}

/// Drive one job through its pipeline.
pub(crate) async fn executor<C: Clock>(ctx: EngineCtx<C>, job: Job, cancel: CancellationToken) {
    // Work from the freshest row; ticks race with API mutations.
    let Some(mut job) = ctx.store.lock().job(&job.id).cloned() else {
        return;
    };

    match job.status {
        JobStatus::Waiting => {
            let now = ctx.clock.epoch_secs();
            if !job.is_eligible(now, ctx.config.grace_period) {
                tracing::debug!(job_id = %job.id, "outside grace window, skipping");
                return;
            }
            run_pipeline(&ctx, &mut job, JobStatus::Downloading, cancel).await;
        }
        JobStatus::Error => {
            let resume = job.recovery_stage().unwrap_or(JobStatus::Downloading);
            tracing::info!(job_id = %job.id, resume = %resume, "recovering errored job");
            run_pipeline(&ctx, &mut job, resume, cancel).await;
        }
        status if status.is_in_flight() => {
            // In-flight rows belong to a running task; dedup should have
            // prevented this dispatch.
            tracing::warn!(job_id = %job.id, status = %status, "in-flight row without a task");
        }
        _ => {}
    }
}

async fn run_pipeline<C: Clock>(
    ctx: &EngineCtx<C>,
    job: &mut Job,
    first_stage: JobStatus,
    cancel: CancellationToken,
) {
    ctx.set_status(job, JobStatus::Preparing).await;

    let mut state = PipelineState::default();
    // Resuming past the upload stage: the artifact was already drained
    // (or uploads are off); cleaning may remove it accordingly.
    if first_stage == JobStatus::Cleaning {
        state.uploaded = stages::uploads_enabled(ctx);
    }

    let mut stage = first_stage;
    loop {
        let outcome = match stage {
            JobStatus::Downloading => stages::download(ctx, job, &mut state, &cancel).await,
            JobStatus::Muxing => stages::mux(ctx, job, &mut state).await,
            JobStatus::Uploading => stages::upload(ctx, job, &mut state).await,
            JobStatus::Cleaning => stages::clean(ctx, job, &mut state).await,
            other => {
                tracing::warn!(job_id = %job.id, stage = %other, "unexpected pipeline stage");
                return;
            }
        };

        match outcome {
            StageOutcome::Next => {
                stage = match stage {
                    JobStatus::Downloading => JobStatus::Muxing,
                    JobStatus::Muxing => JobStatus::Uploading,
                    JobStatus::Uploading => JobStatus::Cleaning,
                    JobStatus::Cleaning => {
                        ctx.set_status(job, JobStatus::Done).await;
                        tracing::info!(job_id = %job.id, "job finished");
                        return;
                    }
                    _ => return,
                };
            }
            StageOutcome::Fail(diagnostic) => {
                ctx.fail_job(job, stage, diagnostic).await;
                return;
            }
            StageOutcome::Cancel(diagnostic) => {
                ctx.cancel_job(job, diagnostic).await;
                return;
            }
            StageOutcome::Aborted => {
                // External cancel: the row keeps its current state, no
                // rollback. Recovery stays explicit.
                tracing::info!(job_id = %job.id, "job task aborted");
                return;
            }
        }
    }
}

#[cfg(test)]
mod test_helpers;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
