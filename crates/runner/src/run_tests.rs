// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

fn sh(script: &str) -> RunSpec {
    RunSpec::new("/bin/sh").args(["-c", script])
}

fn passthrough(_line: &str) -> LineVerdict {
    LineVerdict::Ignore
}

#[tokio::test]
async fn clean_exit_reports_zero() {
    let outcome = run_scanned(
        sh("echo hello"),
        StreamSel::Stdout,
        passthrough,
        None,
        CancellationToken::new(),
    )
    .await;
    assert_eq!(outcome.exit_code, 0);
    assert!(outcome.success());
    assert!(!outcome.fatal);
}

#[tokio::test]
async fn nonzero_exit_is_surfaced() {
    let outcome = run_scanned(
        sh("exit 3"),
        StreamSel::Stdout,
        passthrough,
        None,
        CancellationToken::new(),
    )
    .await;
    assert_eq!(outcome.exit_code, 3);
    assert!(!outcome.success());
}

#[tokio::test]
async fn missing_binary_maps_to_spawn_blocked() {
    let outcome = run_scanned(
        RunSpec::new("/definitely/not/a/binary"),
        StreamSel::Stdout,
        passthrough,
        None,
        CancellationToken::new(),
    )
    .await;
    assert_eq!(outcome.exit_code, SPAWN_BLOCKED_CODE);
    assert_eq!(outcome.diagnostic.as_deref(), Some("spawn blocked"));
}

#[tokio::test]
async fn classifier_sees_lines_and_captures() {
    let outcome = run_scanned(
        sh("echo 'Selected quality: 720p'; echo noise"),
        StreamSel::Stdout,
        |line| {
            if line.contains("Selected quality") {
                LineVerdict::Capture("720p".to_string())
            } else {
                LineVerdict::Ignore
            }
        },
        None,
        CancellationToken::new(),
    )
    .await;
    assert_eq!(outcome.captured, vec!["720p".to_string()]);
}

#[tokio::test]
async fn fatal_verdict_kills_child_and_stops() {
    let start = std::time::Instant::now();
    let outcome = run_scanned(
        sh("echo FATAL MARKER; sleep 30"),
        StreamSel::Stdout,
        |line| {
            if line.contains("FATAL") {
                LineVerdict::Fatal(line.to_string())
            } else {
                LineVerdict::Ignore
            }
        },
        None,
        CancellationToken::new(),
    )
    .await;
    assert!(outcome.fatal);
    assert_eq!(outcome.diagnostic.as_deref(), Some("FATAL MARKER"));
    // The sleep must not run to completion.
    assert!(start.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn announce_signal_fires_once() {
    let (tx, mut rx) = tokio::sync::mpsc::channel(8);
    let outcome = run_scanned(
        sh("echo 'starting download'; echo 'total downloaded: 1MB'"),
        StreamSel::Stdout,
        |line| {
            if line.contains("download") {
                LineVerdict::Announce
            } else {
                LineVerdict::Ignore
            }
        },
        Some(tx),
        CancellationToken::new(),
    )
    .await;
    assert!(outcome.success());
    assert_eq!(rx.recv().await, Some(RunnerSignal::Announced));
    // Second announce-classified line produces no second signal.
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn stderr_scanning_selects_the_right_stream() {
    let outcome = run_scanned(
        sh("echo out-line; echo err-line 1>&2"),
        StreamSel::Stderr,
        |line| LineVerdict::Diagnostic(line.to_string()),
        None,
        CancellationToken::new(),
    )
    .await;
    assert_eq!(outcome.diagnostic.as_deref(), Some("err-line"));
}

#[tokio::test]
async fn cancellation_terminates_promptly() {
    let cancel = CancellationToken::new();
    let handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            run_scanned(sh("sleep 30"), StreamSel::Stdout, passthrough, None, cancel).await
        })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;
    let start = std::time::Instant::now();
    cancel.cancel();
    let outcome = handle.await.unwrap();
    assert!(outcome.cancelled);
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn huge_output_does_not_deadlock() {
    // 4 MiB of output through an unscanned stream plus a scanned one.
    let outcome = run_scanned(
        sh("head -c 4194304 /dev/zero | tr '\\0' 'x' 1>&2; echo done"),
        StreamSel::Stdout,
        passthrough,
        None,
        CancellationToken::new(),
    )
    .await;
    assert_eq!(outcome.exit_code, 0);
}

#[tokio::test]
async fn run_collect_composes_error_from_both_streams() {
    let outcome = run_collect(sh("echo only-stdout; exit 2")).await;
    assert_eq!(outcome.exit_code, 2);
    // stderr empty, falls back to stdout.
    assert_eq!(outcome.diagnostic.as_deref(), Some("only-stdout"));

    let outcome = run_collect(sh("echo on-stderr 1>&2; exit 2")).await;
    assert_eq!(outcome.diagnostic.as_deref(), Some("on-stderr"));

    let outcome = run_collect(sh("echo fine")).await;
    assert_eq!(outcome.exit_code, 0);
    assert!(outcome.diagnostic.is_none());
}
