// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;
use yare::parameterized;

#[parameterized(
    slash = { "a/b", "a／b" },
    colon = { "live: singing", "live： singing" },
    angle = { "<free chat>", "＜free chat＞" },
    quotes = { "\"quote\" 'tick'", "”quote” ’tick’" },
    backslash = { "a\\b", "a＼b" },
    question = { "really?", "really？" },
    star = { "super*chat", "super⋆chat" },
    pipe = { "a|b", "a｜b" },
    hash_removed = { "#shorts tag", "shorts tag" },
)]
fn substitutes_reserved_characters(input: &str, expected: &str) {
    assert_eq!(sanitize_filename(input), expected);
}

#[test]
fn plain_ascii_untouched() {
    let input = "Stream Archive [2022.01.02] - part 3.final";
    assert_eq!(sanitize_filename(input), input);
}

#[test]
fn emoji_replaced_with_underscore() {
    assert_eq!(sanitize_filename("singing \u{1F3B5} now"), "singing _ now");
    assert_eq!(sanitize_filename("\u{1F600}\u{1F680}"), "__");
}

#[test]
fn japanese_text_untouched() {
    let input = "【歌枠】こんばんは！";
    assert_eq!(sanitize_filename(input), input);
}

#[test]
fn job_filename_uses_jst_date() {
    // 2023-12-31T16:00:00Z is 2024-01-01T01:00:00+09:00.
    let filename = build_job_filename(1_704_038_400, "abc123", "New Year stream");
    assert_eq!(filename, "[2024.1.1.abc123] New Year stream");
}

#[test]
fn job_filename_sanitizes_title() {
    let filename = build_job_filename(1_704_038_400, "v1", "ask: anything?");
    assert_eq!(filename, "[2024.1.1.v1] ask： anything？");
}

proptest! {
    #[test]
    fn sanitized_never_contains_reserved(input in "\\PC*") {
        let cleaned = sanitize_filename(&input);
        for forbidden in ['/', ':', '<', '>', '"', '\'', '\\', '?', '*', '|', '#'] {
            prop_assert!(!cleaned.contains(forbidden));
        }
    }

    #[test]
    fn alphanumerics_survive(input in "[a-zA-Z0-9 .\\[\\]-]{0,64}") {
        prop_assert_eq!(sanitize_filename(&input), input);
    }
}
