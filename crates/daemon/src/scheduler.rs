// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Autoscheduler: periodic filter evaluation over the discovery feeds.

use crate::broadcast::Broadcaster;
use crate::env::Config;
use crate::notifier::Notifier;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use vtrec_core::{build_job_filename, AutoRule, Job, RuleKind, Video};
use vtrec_discovery::{HolodexClient, LiveIndexClient};
use vtrec_storage::Store;

/// Apply the exclude pass then the include pass, then deduplicate
/// against the existing job ids.
///
/// A video matching both an include and an exclude rule is dropped: the
/// exclude pass runs first and removes it before includes are consulted.
pub fn filter_videos(
    rules: &[AutoRule],
    existing_ids: &HashSet<String>,
    videos: Vec<Video>,
) -> Vec<Video> {
    let include: Vec<&AutoRule> = rules.iter().filter(|r| r.include).collect();
    if include.is_empty() {
        return Vec::new();
    }
    let exclude: Vec<&AutoRule> = rules.iter().filter(|r| !r.include).collect();

    videos
        .into_iter()
        .filter(|video| !exclude.iter().any(|rule| rule.matches(video)))
        .filter(|video| {
            include.iter().any(|rule| match rule.kind {
                RuleKind::Channel | RuleKind::Group => rule.matches(video),
                // Chains gate only the word-based whitelist rules.
                RuleKind::Word | RuleKind::RegexWord => rule.matches_with_chains(video),
            })
        })
        .filter(|video| !existing_ids.contains(&video.job_id()))
        .collect()
}

/// Build the job row for a discovered video.
pub fn job_from_video(video: &Video) -> Job {
    let job_id = video.job_id();
    let filename = build_job_filename(video.start_time, &job_id, &video.title);
    Job::new(
        job_id,
        &video.title,
        filename,
        video.start_time,
        &video.channel_id,
        video.is_member,
    )
}

pub struct Autoscheduler {
    pub config: Arc<Config>,
    pub store: Arc<Mutex<Store>>,
    pub holodex: Arc<HolodexClient>,
    pub live_index: Arc<LiveIndexClient>,
    pub broadcaster: Broadcaster,
    pub notifier: Notifier,
}

impl Autoscheduler {
    /// One tick: load rules, query discovery, filter, insert, emit.
    pub async fn tick(&self) {
        let (rules, existing_ids) = {
            let store = self.store.lock();
            let ids: HashSet<String> = store.job_ids().into_iter().collect();
            (store.rules().to_vec(), ids)
        };
        if !rules.iter().any(|r| r.include) {
            tracing::info!("no include rules configured, skipping autoscheduler pass");
            return;
        }

        let mut videos = Vec::new();
        match self.holodex.get_lives().await {
            Ok(found) => videos.extend(found),
            Err(err) => tracing::error!(%err, "holodex live query failed"),
        }
        match self.live_index.get_lives().await {
            Ok(found) => videos.extend(found),
            Err(err) => tracing::error!(%err, "live index query failed"),
        }
        if videos.is_empty() {
            tracing::warn!("no live or upcoming streams found upstream");
            return;
        }
        tracing::info!(count = videos.len(), "evaluating discovered streams");

        let selected = filter_videos(&rules, &existing_ids, videos);
        if selected.is_empty() {
            tracing::info!("no new streams matched the filter rules");
            return;
        }

        for video in selected {
            let job = job_from_video(&video);
            tracing::info!(job_id = %job.id, title = %job.title, "scheduling from autoscheduler");
            if let Err(err) = self.store.lock().upsert_job(job.clone()) {
                tracing::error!(job_id = %job.id, %err, "failed to persist scheduled job");
                continue;
            }
            self.broadcaster.job_scheduled(&job).await;
            self.notifier.job_update(&job);
        }
    }

    /// Periodic loop, leader only.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.scheduler_tick);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.tick().await,
            }
        }
        tracing::info!("autoscheduler stopped");
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
