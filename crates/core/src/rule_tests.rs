// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::platform::Platform;
use crate::video::VideoStatus;
use yare::parameterized;

fn video(title: &str, channel: &str, org: Option<&str>) -> Video {
    Video {
        id: "vid1".to_string(),
        title: title.to_string(),
        start_time: 0,
        channel_id: channel.to_string(),
        org: org.map(str::to_string),
        status: VideoStatus::Upcoming,
        platform: Platform::Youtube,
        is_member: false,
    }
}

fn rule(kind: RuleKind, data: &str) -> AutoRule {
    AutoRule { id: 1, kind, data: data.to_string(), include: true, chains: Vec::new() }
}

#[test]
fn channel_rule_is_exact() {
    let r = rule(RuleKind::Channel, "UCabc");
    assert!(r.matches(&video("anything", "UCabc", None)));
    assert!(!r.matches(&video("anything", "ucabc", None)));
}

#[test]
fn group_rule_is_case_insensitive() {
    let r = rule(RuleKind::Group, "Hololive");
    assert!(r.matches(&video("t", "c", Some("hololive"))));
    assert!(!r.matches(&video("t", "c", None)));
}

#[parameterized(
    exact = { "Karaoke", "Unarchived Karaoke Night", true },
    folded = { "karaoke", "KARAOKE stream", true },
    missing = { "karaoke", "zatsudan", false },
)]
fn word_rule_is_substring(data: &str, title: &str, matched: bool) {
    let r = rule(RuleKind::Word, data);
    assert_eq!(r.matches(&video(title, "c", None)), matched);
}

#[test]
fn regex_rule_is_case_insensitive() {
    let r = rule(RuleKind::RegexWord, r"un-?archived?");
    assert!(r.matches(&video("UNARCHIVE karaoke", "c", None)));
    assert!(r.matches(&video("un-archived singing", "c", None)));
    assert!(!r.matches(&video("archive only", "c", None)));
}

#[test]
fn invalid_regex_never_matches() {
    let r = rule(RuleKind::RegexWord, "([unclosed");
    assert!(!r.matches(&video("anything", "c", None)));
    assert!(r.validate().is_err());
}

#[test]
fn chains_are_intersection() {
    let mut r = rule(RuleKind::Word, "karaoke");
    r.chains = vec![
        RuleChain { kind: RuleKind::Group, data: "hololive".to_string() },
        RuleChain { kind: RuleKind::Word, data: "unarchived".to_string() },
    ];

    let hit = video("Unarchived Karaoke", "c", Some("Hololive"));
    assert!(r.matches_with_chains(&hit));

    // One chain entry failing kills the whole rule.
    let wrong_org = video("Unarchived Karaoke", "c", Some("Nijisanji"));
    assert!(!r.matches_with_chains(&wrong_org));
}

#[test]
fn empty_chains_always_pass() {
    let r = rule(RuleKind::Word, "karaoke");
    assert!(r.chains_match(&video("anything", "c", None)));
}

#[test]
fn chains_only_for_word_kinds() {
    assert!(RuleKind::Word.allows_chains());
    assert!(RuleKind::RegexWord.allows_chains());
    assert!(!RuleKind::Channel.allows_chains());
    assert!(!RuleKind::Group.allows_chains());
}

#[test]
fn kind_parses_wire_names() {
    assert_eq!(RuleKind::parse("regex_word"), Some(RuleKind::RegexWord));
    assert_eq!(RuleKind::parse("nope"), None);
}

#[test]
fn rule_serializes_with_type_key() {
    let r = rule(RuleKind::Word, "karaoke");
    let json = serde_json::to_value(&r).unwrap();
    assert_eq!(json["type"], "word");
    assert!(json.get("chains").is_none());
}
