// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Platform discriminant and job-id prefix routing.

use serde::{Deserialize, Serialize};

/// Streaming platform a job belongs to.
///
/// The job id prefix is authoritative for routing: YouTube jobs carry the
/// bare video id, every other platform is prefixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Youtube,
    Twitch,
    Twitcasting,
    Twitter,
    Mildom,
}

crate::simple_display! {
    Platform {
        Youtube => "youtube",
        Twitch => "twitch",
        Twitcasting => "twitcasting",
        Twitter => "twitter",
        Mildom => "mildom",
    }
}

impl Platform {
    /// Route a job id to its platform from the id prefix.
    pub fn from_job_id(id: &str) -> Self {
        if id.starts_with("twcast-") {
            Platform::Twitcasting
        } else if id.starts_with("twtsp-") {
            Platform::Twitter
        } else if id.starts_with("ttv-") {
            Platform::Twitch
        } else if id.starts_with("mildom-") {
            Platform::Mildom
        } else {
            Platform::Youtube
        }
    }

    /// Parse a platform name as it appears in discovery payloads.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "youtube" => Some(Platform::Youtube),
            "twitch" => Some(Platform::Twitch),
            "twitcasting" => Some(Platform::Twitcasting),
            "twitter" => Some(Platform::Twitter),
            "mildom" => Some(Platform::Mildom),
            _ => None,
        }
    }

    /// Prefix applied to native video ids to build the job id.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Platform::Youtube => "",
            Platform::Twitch => "ttv-",
            Platform::Twitcasting => "twcast-",
            Platform::Twitter => "twtsp-",
            Platform::Mildom => "mildom-",
        }
    }

    /// Build the job id for a native video id on this platform.
    pub fn job_id(&self, native_id: &str) -> String {
        format!("{}{}", self.id_prefix(), native_id)
    }

    /// Strip the platform prefix back off a job id.
    pub fn native_id<'a>(&self, job_id: &'a str) -> &'a str {
        job_id.strip_prefix(self.id_prefix()).unwrap_or(job_id)
    }

    /// Platforms that produce a video artifact (everything but Spaces audio).
    pub fn is_video(&self) -> bool {
        !matches!(self, Platform::Twitter)
    }
}

#[cfg(test)]
#[path = "platform_tests.rs"]
mod tests;
