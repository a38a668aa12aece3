// crates/publish-gate-providers/src/checks.rs
// ============================================================================
// Module: Validation Checks
// Description: Command, secret-scan, and file-size validation checks.
// Purpose: Provide the built-in checks a publish stage is assembled from.
// Dependencies: publish-gate-core, regex, tempfile, tracing
// ============================================================================

//! ## Overview
//! Checks are black boxes to the test runner: each returns PASS, FAIL, or
//! SKIP with a message. [`CommandCheck`] shells out to a build or test tool
//! inside a scratch copy of the snapshot and kills it at its own deadline;
//! [`SecretScanCheck`] looks for credential assignments in text artifacts;
//! [`FileSizeCheck`] bounds artifact sizes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::VecDeque;
use std::fs;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;
#[cfg(unix)]
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::Child;
use std::process::Command;
use std::process::Stdio;
use std::sync::mpsc;
use std::sync::mpsc::Receiver;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use publish_gate_core::ArtifactSnapshot;
use publish_gate_core::CheckName;
use publish_gate_core::CheckOutcome;
use publish_gate_core::ValidationCheck;
use regex::Regex;
use tempfile::TempDir;
use thiserror::Error;
use tracing::debug;
use tracing::warn;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Check construction errors.
#[derive(Debug, Error)]
pub enum CheckBuildError {
    /// A scan pattern failed to compile.
    #[error("invalid pattern {pattern}: {message}")]
    Pattern {
        /// Offending pattern.
        pattern: String,
        /// Compiler message.
        message: String,
    },
    /// The command is empty.
    #[error("check {0} has an empty command")]
    EmptyCommand(String),
}

// ============================================================================
// SECTION: Command Check
// ============================================================================

/// Number of trailing output lines reported on failure.
const OUTPUT_TAIL_LINES: usize = 20;
/// Poll interval while waiting for a child process.
const CHILD_POLL_INTERVAL: Duration = Duration::from_millis(20);
/// How long output readers may keep draining after the child is gone.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Runs an external command against a private copy of the snapshot; a
/// non-zero exit status fails the check.
///
/// # Invariants
/// - The command runs in a fresh directory holding exactly the snapshot bytes,
///   so later edits to the artifact root never reach it.
/// - On unix the child leads its own process group and a deadline kill takes
///   the whole group down.
#[derive(Debug, Clone)]
pub struct CommandCheck {
    /// Check name.
    name: CheckName,
    /// Program to execute.
    program: String,
    /// Program arguments.
    args: Vec<String>,
    /// Deadline after which the child is killed.
    deadline: Duration,
}

impl CommandCheck {
    /// Creates a command check from a program and arguments.
    ///
    /// # Errors
    ///
    /// Returns [`CheckBuildError::EmptyCommand`] when `command` is empty.
    pub fn new(
        name: CheckName,
        command: &[String],
        deadline: Duration,
    ) -> Result<Self, CheckBuildError> {
        let Some((program, args)) = command.split_first() else {
            return Err(CheckBuildError::EmptyCommand(name.to_string()));
        };
        Ok(Self {
            name,
            program: program.clone(),
            args: args.to_vec(),
            deadline,
        })
    }

    /// Waits for the child until the deadline, killing it when exceeded.
    fn wait_with_deadline(&self, child: &mut Child) -> Result<Option<i32>, String> {
        let started = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(Some(status.code().unwrap_or(-1))),
                Ok(None) if started.elapsed() >= self.deadline => {
                    self.kill_tree(child);
                    let _ = child.wait();
                    return Ok(None);
                }
                Ok(None) => thread::sleep(CHILD_POLL_INTERVAL),
                Err(err) => return Err(err.to_string()),
            }
        }
    }

    /// Kills the child's process group, falling back to the child alone.
    fn kill_tree(&self, child: &mut Child) {
        #[cfg(unix)]
        {
            let group = format!("-{}", child.id());
            let killed = Command::new("kill")
                .args(["-KILL", "--", group.as_str()])
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
            if matches!(killed, Ok(status) if status.success()) {
                return;
            }
            warn!(check = %self.name, "process group kill failed; killing child only");
        }
        if let Err(err) = child.kill() {
            warn!(check = %self.name, error = %err, "failed to kill check process");
        }
    }
}

/// Writes every snapshot artifact under `root`.
fn materialize(snapshot: &ArtifactSnapshot, root: &Path) -> std::io::Result<()> {
    for artifact in snapshot.artifacts() {
        let target = root.join(artifact.path());
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, artifact.bytes())?;
    }
    Ok(())
}

impl ValidationCheck for CommandCheck {
    fn name(&self) -> &CheckName {
        &self.name
    }

    fn run(&self, snapshot: &ArtifactSnapshot) -> CheckOutcome {
        debug!(check = %self.name, program = %self.program, "running command check");
        let workdir = match TempDir::new() {
            Ok(dir) => dir,
            Err(err) => return CheckOutcome::Fail(format!("failed to create work dir: {err}")),
        };
        if let Err(err) = materialize(snapshot, workdir.path()) {
            return CheckOutcome::Fail(format!("failed to stage snapshot: {err}"));
        }
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .current_dir(workdir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        command.process_group(0);
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                return CheckOutcome::Fail(format!("failed to start {}: {err}", self.program));
            }
        };
        let stdout = child.stdout.take().map(spawn_tail_reader);
        let stderr = child.stderr.take().map(spawn_tail_reader);
        let status = self.wait_with_deadline(&mut child);
        let drain_until = Instant::now() + OUTPUT_DRAIN_GRACE;
        let mut tail = collect_tail(stdout, drain_until);
        tail.extend(collect_tail(stderr, drain_until));
        let excess = tail.len().saturating_sub(OUTPUT_TAIL_LINES);
        let tail = tail.split_off(excess).join("\n");

        match status {
            Ok(Some(0)) => CheckOutcome::Pass(format!("{} exited 0", self.program)),
            Ok(Some(code)) => {
                let message = format!("{} exited {code}\n{tail}", self.program);
                CheckOutcome::Fail(message.trim_end().to_string())
            }
            Ok(None) => CheckOutcome::Fail(format!(
                "{} exceeded its {}s deadline and was killed",
                self.program,
                self.deadline.as_secs()
            )),
            Err(err) => CheckOutcome::Fail(format!("failed to wait for {}: {err}", self.program)),
        }
    }
}

/// Drains a pipe to EOF on a thread, keeping only the trailing lines.
///
/// Lines are decoded lossily; invalid UTF-8 never stops the drain, since a
/// closed pipe would kill the child with `SIGPIPE`.
fn spawn_tail_reader<R: Read + Send + 'static>(pipe: R) -> Receiver<Vec<String>> {
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let mut reader = BufReader::new(pipe);
        let mut lines = VecDeque::with_capacity(OUTPUT_TAIL_LINES);
        let mut buffer = Vec::new();
        loop {
            buffer.clear();
            match reader.read_until(b'\n', &mut buffer) {
                Ok(0) => break,
                Ok(_) => {
                    if lines.len() == OUTPUT_TAIL_LINES {
                        lines.pop_front();
                    }
                    let line = String::from_utf8_lossy(&buffer);
                    lines.push_back(line.trim_end_matches(['\n', '\r']).to_string());
                }
                Err(_) => break,
            }
        }
        let _ = sender.send(lines.into_iter().collect());
    });
    receiver
}

/// Collects a tail reader's lines, giving up at `until` when something still
/// holds the pipe open.
fn collect_tail(reader: Option<Receiver<Vec<String>>>, until: Instant) -> Vec<String> {
    let Some(reader) = reader else {
        return Vec::new();
    };
    let remaining = until.saturating_duration_since(Instant::now());
    reader.recv_timeout(remaining).unwrap_or_default()
}

// ============================================================================
// SECTION: Secret Scan Check
// ============================================================================

/// Default credential assignment pattern.
pub const DEFAULT_SECRET_PATTERN: &str =
    r#"(?i)(password|passwd|token|secret|api[_-]?key)\b\s*[:=]\s*["'][^"'\s]{4,}["']"#;

/// Scans UTF-8 artifacts for credential assignments.
#[derive(Debug, Clone)]
pub struct SecretScanCheck {
    /// Check name.
    name: CheckName,
    /// Compiled patterns.
    patterns: Vec<Regex>,
}

impl SecretScanCheck {
    /// Creates a scanner with the default pattern plus any extra patterns.
    ///
    /// # Errors
    ///
    /// Returns [`CheckBuildError::Pattern`] when a pattern fails to compile.
    pub fn new(name: CheckName, extra_patterns: &[String]) -> Result<Self, CheckBuildError> {
        let mut patterns = Vec::with_capacity(extra_patterns.len() + 1);
        let sources =
            std::iter::once(DEFAULT_SECRET_PATTERN)
                .chain(extra_patterns.iter().map(String::as_str));
        for pattern in sources {
            let compiled = Regex::new(pattern).map_err(|err| CheckBuildError::Pattern {
                pattern: pattern.to_string(),
                message: err.to_string(),
            })?;
            patterns.push(compiled);
        }
        Ok(Self {
            name,
            patterns,
        })
    }
}

impl ValidationCheck for SecretScanCheck {
    fn name(&self) -> &CheckName {
        &self.name
    }

    fn run(&self, snapshot: &ArtifactSnapshot) -> CheckOutcome {
        let mut findings = Vec::new();
        let mut scanned = 0usize;
        for artifact in snapshot.artifacts() {
            let Ok(text) = std::str::from_utf8(artifact.bytes()) else {
                continue;
            };
            scanned += 1;
            for (index, line) in text.lines().enumerate() {
                if self.patterns.iter().any(|pattern| pattern.is_match(line)) {
                    findings.push(format!("{}:{}", artifact.path(), index + 1));
                }
            }
        }
        if scanned == 0 {
            return CheckOutcome::Skip("no text artifacts to scan".to_string());
        }
        if findings.is_empty() {
            CheckOutcome::Pass(format!("scanned {scanned} text artifacts"))
        } else {
            CheckOutcome::Fail(format!("possible credentials at {}", findings.join(", ")))
        }
    }
}

// ============================================================================
// SECTION: File Size Check
// ============================================================================

/// Fails when any artifact exceeds a size limit.
#[derive(Debug, Clone)]
pub struct FileSizeCheck {
    /// Check name.
    name: CheckName,
    /// Maximum artifact size in bytes.
    max_bytes: u64,
}

impl FileSizeCheck {
    /// Creates a size check.
    #[must_use]
    pub const fn new(name: CheckName, max_bytes: u64) -> Self {
        Self {
            name,
            max_bytes,
        }
    }
}

impl ValidationCheck for FileSizeCheck {
    fn name(&self) -> &CheckName {
        &self.name
    }

    fn run(&self, snapshot: &ArtifactSnapshot) -> CheckOutcome {
        let oversized: Vec<String> = snapshot
            .artifacts()
            .iter()
            .filter(|artifact| artifact.size() > self.max_bytes)
            .map(|artifact| format!("{} ({} bytes)", artifact.path(), artifact.size()))
            .collect();
        if oversized.is_empty() {
            CheckOutcome::Pass(format!("all artifacts within {} bytes", self.max_bytes))
        } else {
            CheckOutcome::Fail(format!("over {} bytes: {}", self.max_bytes, oversized.join(", ")))
        }
    }
}
