// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("WEBSERVER_PASSWORD is empty")]
    MissingPassword,

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Parse the loose boolean forms accepted in the environment.
pub fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "yes" | "1" | "y")
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

fn env_seconds(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env_var(name) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        None => Ok(default),
    }
}

fn env_path(name: &str, default: &str) -> PathBuf {
    env_var(name).map(PathBuf::from).unwrap_or_else(|| PathBuf::from(default))
}

/// Daemon configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base directory holding `dbs/`, `dataset/`, `streamdump/`,
    /// `chatarchive/`, and `logs/`.
    pub base_dir: PathBuf,
    pub db_path: PathBuf,
    pub lock_path: PathBuf,
    pub ipc_path: PathBuf,
    pub records_cache_path: PathBuf,
    pub dataset_dir: PathBuf,
    pub streamdump_dir: PathBuf,
    pub chatarchive_dir: PathBuf,
    pub logs_dir: PathBuf,

    pub downloader_tick: Duration,
    pub scheduler_tick: Duration,
    /// Seconds before scheduled start a job becomes eligible.
    pub grace_period: i64,

    pub holodex_api_key: Option<String>,

    pub ytarchive_path: PathBuf,
    pub ffmpeg_path: PathBuf,
    pub mkvmerge_path: PathBuf,
    pub rclone_path: PathBuf,
    pub ytdlp_path: PathBuf,

    pub rclone_drive_target: Option<String>,
    pub rclone_disabled: bool,

    pub password: String,
    pub reverse_proxy_secret: Option<String>,
    pub port: u16,
    pub webhook_url: Option<String>,
}

impl Config {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let base_dir = env_var("VTREC_BASE_DIR")
            .map(PathBuf::from)
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));

        let db_name = env_var("VTREC_DB").unwrap_or_else(|| "vtrec.json".to_string());
        let dbs_dir = base_dir.join("dbs");

        let password = env_var("WEBSERVER_PASSWORD").ok_or(ConfigError::MissingPassword)?;

        let port = match env_var("WEBSERVER_PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::Invalid { name: "WEBSERVER_PORT", value: raw })?,
            None => 12790,
        };

        Ok(Self {
            db_path: dbs_dir.join(&db_name),
            lock_path: dbs_dir.join("vtrec.lock"),
            ipc_path: dbs_dir.join("vtrec-ipc.sock"),
            records_cache_path: dbs_dir.join("records.json"),
            dataset_dir: base_dir.join("dataset"),
            streamdump_dir: base_dir.join("streamdump"),
            chatarchive_dir: base_dir.join("chatarchive"),
            logs_dir: base_dir.join("logs"),

            downloader_tick: Duration::from_secs(env_seconds("VTREC_LOOP_DOWNLOADER", 60)?),
            scheduler_tick: Duration::from_secs(env_seconds("VTREC_LOOP_SCHEDULER", 180)?),
            grace_period: env_seconds("VTREC_GRACE_PERIOD", 120)? as i64,

            holodex_api_key: env_var("HOLODEX_API_KEY"),

            ytarchive_path: env_path("YTARCHIVE_PATH", "ytarchive"),
            ffmpeg_path: env_path("FFMPEG_PATH", "ffmpeg"),
            mkvmerge_path: env_path("MKVMERGE_PATH", "mkvmerge"),
            rclone_path: env_path("RCLONE_PATH", "rclone"),
            ytdlp_path: env_path("YTDLP_PATH", "yt-dlp"),

            rclone_drive_target: env_var("RCLONE_DRIVE_TARGET"),
            rclone_disabled: env_var("RCLONE_DISABLE").as_deref().map(parse_bool).unwrap_or(false),

            password,
            reverse_proxy_secret: env_var("WEBSERVER_REVERSE_PROXY_SECRET"),
            port,
            webhook_url: env_var("NOTIFY_WEBHOOK_URL"),

            base_dir,
        })
    }

    /// Test configuration rooted at a scratch directory.
    pub fn for_base_dir(base_dir: PathBuf) -> Self {
        let dbs_dir = base_dir.join("dbs");
        Self {
            db_path: dbs_dir.join("vtrec.json"),
            lock_path: dbs_dir.join("vtrec.lock"),
            ipc_path: dbs_dir.join("vtrec-ipc.sock"),
            records_cache_path: dbs_dir.join("records.json"),
            dataset_dir: base_dir.join("dataset"),
            streamdump_dir: base_dir.join("streamdump"),
            chatarchive_dir: base_dir.join("chatarchive"),
            logs_dir: base_dir.join("logs"),
            downloader_tick: Duration::from_secs(60),
            scheduler_tick: Duration::from_secs(180),
            grace_period: 120,
            holodex_api_key: None,
            // Binaries under the scratch dir never exist, so tests see
            // deterministic spawn failures.
            ytarchive_path: base_dir.join("bin/ytarchive"),
            ffmpeg_path: base_dir.join("bin/ffmpeg"),
            mkvmerge_path: base_dir.join("bin/mkvmerge"),
            rclone_path: base_dir.join("bin/rclone"),
            ytdlp_path: base_dir.join("bin/yt-dlp"),
            rclone_drive_target: None,
            rclone_disabled: true,
            password: "test-password".to_string(),
            reverse_proxy_secret: None,
            port: 0,
            webhook_url: None,
            base_dir,
        }
    }

    /// The rclone settings shared with the chat pipeline.
    pub fn rclone_cfg(&self) -> vtrec_chat::RcloneCfg {
        vtrec_chat::RcloneCfg {
            path: self.rclone_path.clone(),
            drive_target: self.rclone_drive_target.clone(),
            disabled: self.rclone_disabled,
        }
    }
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
