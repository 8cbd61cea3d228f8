// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervised subprocess execution with line scanning.

use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Exit code reported when the child binary cannot be launched.
pub const SPAWN_BLOCKED_CODE: i32 = -100;

/// Cap on a single buffered line. Longer lines are logged and dropped;
/// reading resumes at the next newline.
const LINE_CAP: usize = 1024 * 1024;

/// Which child stream(s) the classifier sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSel {
    Stdout,
    Stderr,
    Both,
}

/// Classifier output for one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineVerdict {
    /// Nothing of interest.
    Ignore,
    /// Progress noise; logged at debug.
    Progress,
    /// The download (or equivalent) has actually started. Signalled to
    /// the caller once, on first occurrence.
    Announce,
    /// Capture a token for the caller (e.g. a resolution label).
    Capture(String),
    /// Remember the line as the latest diagnostic but keep reading.
    Diagnostic(String),
    /// Fatal: record the diagnostic, stop reading, terminate the child.
    Fatal(String),
}

/// Mid-run signals surfaced to the supervising task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerSignal {
    /// First announce-classified line was seen.
    Announced,
    /// A token was captured.
    Captured(String),
}

/// What to run.
#[derive(Debug, Clone)]
pub struct RunSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
}

impl RunSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into(), args: Vec::new(), envs: Vec::new() }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }
}

/// Result of a supervised run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub exit_code: i32,
    /// Last fatal or diagnostic-classified line.
    pub diagnostic: Option<String>,
    /// Tokens captured by the classifier, in order.
    pub captured: Vec<String>,
    /// A fatal classification stopped the read loop.
    pub fatal: bool,
    /// The run was externally cancelled rather than exiting naturally.
    pub cancelled: bool,
}

impl RunOutcome {
    fn spawn_blocked() -> Self {
        Self {
            exit_code: SPAWN_BLOCKED_CODE,
            diagnostic: Some("spawn blocked".to_string()),
            captured: Vec::new(),
            fatal: false,
            cancelled: false,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.fatal && !self.cancelled
    }
}

#[derive(Debug)]
struct ScannedLine {
    text: String,
}

/// Read lines into the channel, tolerating over-long lines. The reader
/// always drains to EOF so the child never blocks on a full pipe.
async fn pump_lines<R>(reader: R, tx: Option<mpsc::Sender<ScannedLine>>, label: &'static str)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf: Vec<u8> = Vec::with_capacity(8 * 1024);
    let mut overflowed = false;
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                if buf.len() > LINE_CAP {
                    if !overflowed {
                        tracing::debug!(stream = label, "line buffer exceeded, silently ignoring");
                        overflowed = true;
                    }
                    continue;
                }
                if let Some(tx) = &tx {
                    let text = String::from_utf8_lossy(&buf).trim_end().to_string();
                    if tx.send(ScannedLine { text }).await.is_err() {
                        // Scanner stopped; keep draining without sending.
                        break;
                    }
                }
            }
            Err(err) => {
                tracing::debug!(stream = label, %err, "pipe read error");
                break;
            }
        }
    }
    // Drain the remainder so the child never blocks on a full pipe, even
    // after the scanner stopped listening.
    let mut sink = [0u8; 8 * 1024];
    while matches!(tokio::io::AsyncReadExt::read(&mut reader, &mut sink).await, Ok(n) if n > 0) {}
}

/// Run a child binary, scanning the selected stream(s) through
/// `classify`. Signals are surfaced over `signals` while the child is
/// still running; the final outcome carries the exit code and the last
/// diagnostic line.
pub async fn run_scanned<F>(
    spec: RunSpec,
    scan: StreamSel,
    mut classify: F,
    signals: Option<mpsc::Sender<RunnerSignal>>,
    cancel: CancellationToken,
) -> RunOutcome
where
    F: FnMut(&str) -> LineVerdict + Send,
{
    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .envs(spec.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            tracing::error!(program = %spec.program.display(), %err, "failed to spawn child");
            return RunOutcome::spawn_blocked();
        }
    };

    let (line_tx, mut line_rx) = mpsc::channel::<ScannedLine>(64);
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let stdout_tx = match scan {
        StreamSel::Stdout | StreamSel::Both => Some(line_tx.clone()),
        StreamSel::Stderr => None,
    };
    let stderr_tx = match scan {
        StreamSel::Stderr | StreamSel::Both => Some(line_tx),
        StreamSel::Stdout => None,
    };

    let mut pumps = Vec::new();
    if let Some(stdout) = stdout {
        pumps.push(tokio::spawn(pump_lines(stdout, stdout_tx, "stdout")));
    }
    if let Some(stderr) = stderr {
        pumps.push(tokio::spawn(pump_lines(stderr, stderr_tx, "stderr")));
    }

    let mut diagnostic: Option<String> = None;
    let mut captured = Vec::new();
    let mut fatal = false;
    let mut cancelled = false;
    let mut announced = false;

    loop {
        tokio::select! {
            _ = cancel.cancelled(), if !cancelled => {
                cancelled = true;
                let _ = child.start_kill();
            }
            line = line_rx.recv() => {
                let Some(line) = line else { break };
                match classify(&line.text) {
                    LineVerdict::Ignore => {}
                    LineVerdict::Progress => {
                        tracing::debug!(line = %line.text, "child progress");
                    }
                    LineVerdict::Announce => {
                        if !announced {
                            announced = true;
                            if let Some(signals) = &signals {
                                let _ = signals.send(RunnerSignal::Announced).await;
                            }
                        }
                    }
                    LineVerdict::Capture(token) => {
                        if let Some(signals) = &signals {
                            let _ = signals.send(RunnerSignal::Captured(token.clone())).await;
                        }
                        captured.push(token);
                    }
                    LineVerdict::Diagnostic(diag) => {
                        diagnostic = Some(diag);
                    }
                    LineVerdict::Fatal(diag) => {
                        tracing::error!(line = %diag, "fatal line from child");
                        diagnostic = Some(diag);
                        fatal = true;
                        let _ = child.start_kill();
                        break;
                    }
                }
            }
        }
    }
    drop(line_rx);

    let exit_code = match child.wait().await {
        Ok(status) => status.code().unwrap_or(-1),
        Err(err) => {
            tracing::error!(%err, "failed to await child");
            -1
        }
    };
    // Pumps only drain at this point; grandchildren may still hold the
    // pipes open, so abort rather than wait for their EOF.
    for pump in pumps {
        pump.abort();
    }

    RunOutcome { exit_code, diagnostic, captured, fatal, cancelled }
}

/// Run to completion collecting both streams whole; used where the
/// caller composes an error message from the full output (mkvmerge).
pub async fn run_collect(spec: RunSpec) -> RunOutcome {
    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .envs(spec.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null());

    let output = match command.output().await {
        Ok(output) => output,
        Err(err) => {
            tracing::error!(program = %spec.program.display(), %err, "failed to spawn child");
            return RunOutcome::spawn_blocked();
        }
    };

    let exit_code = output.status.code().unwrap_or(-1);
    let diagnostic = if exit_code != 0 {
        let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();
        let text = if stderr.is_empty() {
            String::from_utf8_lossy(&output.stdout).trim_end().to_string()
        } else {
            stderr
        };
        Some(text)
    } else {
        None
    };

    RunOutcome { exit_code, diagnostic, captured: Vec::new(), fatal: false, cancelled: false }
}

/// Full captured output of a child run.
#[derive(Debug, Clone)]
pub struct CaptureOutcome {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Run to completion capturing both streams as strings; used for
/// JSON-dump style invocations (yt-dlp, rclone lsjson).
pub async fn run_capture(spec: RunSpec) -> CaptureOutcome {
    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .envs(spec.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null());

    match command.output().await {
        Ok(output) => CaptureOutcome {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        },
        Err(err) => {
            tracing::error!(program = %spec.program.display(), %err, "failed to spawn child");
            CaptureOutcome {
                exit_code: SPAWN_BLOCKED_CODE,
                stdout: String::new(),
                stderr: "spawn blocked".to_string(),
            }
        }
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
