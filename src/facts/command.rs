//! Bounded-time shell command execution for probes.
//!
//! Probes run through a plain non-interactive shell (`sh -c`, or `cmd /C` on
//! Windows) so results don't depend on the user's rc files. Every run has a
//! deadline; a probe that overruns is killed and reported as
//! [`ProbeError::Timeout`].

use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::ProbeError;

/// Default time budget for a single probe command.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Result of executing a probe command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code (None if killed by signal).
    pub exit_code: Option<i32>,

    /// Standard output.
    pub stdout: String,

    /// Standard error.
    pub stderr: String,

    /// Execution duration.
    pub duration: Duration,

    /// Whether command succeeded (exit code 0).
    pub success: bool,
}

impl CommandOutput {
    /// Stdout followed by stderr; tools like `java -version` print to stderr.
    pub fn combined(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }
}

/// Options for probe execution.
#[derive(Debug, Clone)]
pub struct CommandOptions {
    /// Working directory.
    pub cwd: Option<PathBuf>,

    /// Environment variables (merged with system env).
    pub env: HashMap<String, String>,

    /// Hard deadline for the command.
    pub timeout: Duration,
}

impl Default for CommandOptions {
    fn default() -> Self {
        Self {
            cwd: None,
            env: HashMap::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl CommandOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }
}

/// Execute a shell command, killing it if it exceeds `options.timeout`.
///
/// The deadline also covers collecting output, so a background process
/// that keeps the pipes open cannot stretch the probe past `options.timeout`.
/// A non-zero exit is not an error here; callers decide what it means.
pub fn run(command: &str, options: &CommandOptions) -> Result<CommandOutput, ProbeError> {
    let start = Instant::now();
    let deadline = start + options.timeout;

    let (shell, flag) = probe_shell();
    let mut cmd = Command::new(shell);
    cmd.arg(flag).arg(command);

    if let Some(cwd) = &options.cwd {
        cmd.current_dir(cwd);
    }
    for (key, value) in &options.env {
        cmd.env(key, value);
    }

    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    tracing::debug!(command, timeout = ?options.timeout, "Running probe command");

    let mut child = cmd.spawn().map_err(|e| ProbeError::Spawn {
        command: command.to_string(),
        message: e.to_string(),
    })?;

    let stdout_rx = drain(child.stdout.take());
    let stderr_rx = drain(child.stderr.take());

    let status = match wait_with_deadline(&mut child, deadline) {
        Ok(Some(status)) => status,
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait();
            // Reader threads are left detached: a grandchild may still hold the pipes.
            tracing::debug!(command, "Probe command timed out");
            return Err(timed_out(command, options.timeout));
        }
        Err(e) => {
            let _ = child.kill();
            return Err(ProbeError::Spawn {
                command: command.to_string(),
                message: e.to_string(),
            });
        }
    };

    let (Some(stdout), Some(stderr)) = (
        collect(stdout_rx, deadline),
        collect(stderr_rx, deadline),
    ) else {
        tracing::debug!(command, "Probe output still open at deadline");
        return Err(timed_out(command, options.timeout));
    };

    let duration = start.elapsed();
    tracing::debug!(command, code = ?status.code(), ?duration, "Probe command finished");

    Ok(CommandOutput {
        exit_code: status.code(),
        stdout,
        stderr,
        duration,
        success: status.success(),
    })
}

fn timed_out(command: &str, timeout: Duration) -> ProbeError {
    ProbeError::Timeout {
        command: command.to_string(),
        timeout,
    }
}

fn wait_with_deadline(
    child: &mut Child,
    deadline: Instant,
) -> std::io::Result<Option<std::process::ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Read a pipe to EOF on a background thread.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<Receiver<String>> {
    let mut pipe = pipe?;
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        let _ = tx.send(String::from_utf8_lossy(&buf).to_string());
    });
    Some(rx)
}

/// Wait for a drained pipe until `deadline`; `None` if it is still open.
fn collect(rx: Option<Receiver<String>>, deadline: Instant) -> Option<String> {
    let Some(rx) = rx else {
        return Some(String::new());
    };
    let remaining = deadline.saturating_duration_since(Instant::now());
    match rx.recv_timeout(remaining) {
        Ok(text) => Some(text),
        Err(mpsc::RecvTimeoutError::Disconnected) => Some(String::new()),
        Err(mpsc::RecvTimeoutError::Timeout) => None,
    }
}

fn probe_shell() -> (&'static str, &'static str) {
    if cfg!(target_os = "windows") {
        ("cmd.exe", "/C")
    } else {
        ("/bin/sh", "-c")
    }
}
