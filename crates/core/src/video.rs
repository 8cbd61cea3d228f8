// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Normalized discovery result shared by both upstream clients.

use crate::platform::Platform;
use serde::{Deserialize, Serialize};

/// Upstream broadcast state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    Live,
    Upcoming,
    Past,
    Missing,
}

crate::simple_display! {
    VideoStatus {
        Live => "live",
        Upcoming => "upcoming",
        Past => "past",
        Missing => "missing",
    }
}

/// A live or upcoming broadcast as reported by a discovery API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    /// Native platform id (unprefixed).
    pub id: String,
    pub title: String,
    /// Epoch seconds, preferring actual start over scheduled.
    pub start_time: i64,
    pub channel_id: String,
    /// Organization / group tag, when the upstream knows it.
    pub org: Option<String>,
    pub status: VideoStatus,
    pub platform: Platform,
    /// Derived from the upstream topic tag containing "member".
    pub is_member: bool,
}

impl Video {
    /// Job id for this video (platform prefix applied).
    pub fn job_id(&self) -> String {
        self.platform.job_id(&self.id)
    }

    /// Watch URL used by recorders and extractors.
    pub fn watch_url(&self) -> String {
        match self.platform {
            Platform::Youtube => format!("https://youtube.com/watch?v={}", self.id),
            Platform::Twitch => format!("https://twitch.tv/{}", self.channel_id),
            Platform::Twitcasting => {
                format!("https://twitcasting.tv/{}/movie/{}", self.channel_id, self.id)
            }
            Platform::Twitter => format!("https://twitter.com/i/spaces/{}", self.id),
            Platform::Mildom => format!("https://www.mildom.com/{}", self.channel_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_applies_prefix() {
        let video = Video {
            id: "123456".to_string(),
            title: "radio".to_string(),
            start_time: 0,
            channel_id: "caster".to_string(),
            org: None,
            status: VideoStatus::Live,
            platform: Platform::Twitcasting,
            is_member: false,
        };
        assert_eq!(video.job_id(), "twcast-123456");
        assert_eq!(video.watch_url(), "https://twitcasting.tv/caster/movie/123456");
    }
}
