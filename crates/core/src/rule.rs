// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Autoscheduler filter rules and their matching semantics.

use crate::video::Video;
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};

/// What a rule matches against an inbound [`Video`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// Exact channel id match.
    Channel,
    /// Case-insensitive org tag match.
    Group,
    /// Case-insensitive title substring match.
    Word,
    /// Case-insensitive title regex match.
    RegexWord,
}

crate::simple_display! {
    RuleKind {
        Channel => "channel",
        Group => "group",
        Word => "word",
        RegexWord => "regex_word",
    }
}

impl RuleKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "channel" => Some(RuleKind::Channel),
            "group" => Some(RuleKind::Group),
            "word" => Some(RuleKind::Word),
            "regex_word" => Some(RuleKind::RegexWord),
            _ => None,
        }
    }

    /// Chains are meaningful only for word-based whitelist rules.
    pub fn allows_chains(&self) -> bool {
        matches!(self, RuleKind::Word | RuleKind::RegexWord)
    }
}

/// One chain entry. All chain entries must also match for the outer rule
/// to fire (chains are intersection; the outer rule set is union).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleChain {
    #[serde(rename = "type")]
    pub kind: RuleKind,
    pub data: String,
}

/// One filter row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoRule {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: RuleKind,
    pub data: String,
    /// true = whitelist, false = blacklist.
    #[serde(default = "default_include")]
    pub include: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chains: Vec<RuleChain>,
}

fn default_include() -> bool {
    true
}

fn kind_matches(kind: RuleKind, data: &str, video: &Video) -> bool {
    match kind {
        RuleKind::Channel => video.channel_id == data,
        RuleKind::Group => video
            .org
            .as_deref()
            .is_some_and(|org| org.eq_ignore_ascii_case(data)),
        RuleKind::Word => video
            .title
            .to_lowercase()
            .contains(&data.to_lowercase()),
        RuleKind::RegexWord => RegexBuilder::new(data)
            .case_insensitive(true)
            .build()
            .map(|re| re.is_match(&video.title))
            .unwrap_or_else(|err| {
                tracing::warn!(pattern = data, %err, "invalid rule regex, treated as non-match");
                false
            }),
    }
}

impl AutoRule {
    /// Whether the outer match fires, ignoring chains.
    pub fn matches(&self, video: &Video) -> bool {
        kind_matches(self.kind, &self.data, video)
    }

    /// Whether every chain entry also matches. True for empty chains.
    pub fn chains_match(&self, video: &Video) -> bool {
        self.chains
            .iter()
            .all(|chain| kind_matches(chain.kind, &chain.data, video))
    }

    /// Full include-rule check: outer match plus chain intersection.
    pub fn matches_with_chains(&self, video: &Video) -> bool {
        self.matches(video) && self.chains_match(video)
    }

    /// Validate a regex rule's pattern at insert time.
    pub fn validate(&self) -> Result<(), regex::Error> {
        if self.kind == RuleKind::RegexWord {
            RegexBuilder::new(&self.data).case_insensitive(true).build()?;
        }
        for chain in &self.chains {
            if chain.kind == RuleKind::RegexWord {
                RegexBuilder::new(&chain.data).case_insensitive(true).build()?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "rule_tests.rs"]
mod tests;
