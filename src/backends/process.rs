// SPDX-License-Identifier: GPL-3.0-only

//! Bounded external command execution
//!
//! Camera and printer backends shell out to system tools. Every invocation is
//! bounded by a deadline; on expiry the child is killed and reaped.

use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Captured stdout is capped to this size (a full-resolution JPEG fits easily)
const MAX_STDOUT_BYTES: u64 = 64 * 1024 * 1024;
const MAX_STDERR_BYTES: u64 = 64 * 1024;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Bound on reaping a child after kill
const REAP_TIMEOUT: Duration = Duration::from_secs(2);

/// Output of a finished command
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Why a command did not produce output
#[derive(Debug)]
pub enum RunError {
    /// The program is not installed
    NotFound(io::Error),
    /// Spawning or waiting failed for another reason
    Io(io::Error),
    /// Deadline passed; the child was killed
    Timeout(Duration),
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunError::NotFound(e) => write!(f, "command not found: {}", e),
            RunError::Io(e) => write!(f, "{}", e),
            RunError::Timeout(t) => write!(f, "timed out after {:?}", t),
        }
    }
}

/// Run `program args...` with a deadline, capturing stdout and stderr
pub fn run_with_timeout<S: AsRef<str>>(
    program: &str,
    args: &[S],
    timeout: Duration,
) -> Result<CommandOutput, RunError> {
    debug!(
        program,
        args = ?args.iter().map(AsRef::as_ref).collect::<Vec<_>>(),
        ?timeout,
        "Running command"
    );

    let mut child = Command::new(program)
        .args(args.iter().map(AsRef::as_ref))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => RunError::NotFound(e),
            _ => RunError::Io(e),
        })?;

    let stdout = child.stdout.take().map(|pipe| drain(pipe, MAX_STDOUT_BYTES));
    let stderr = child.stderr.take().map(|pipe| drain(pipe, MAX_STDERR_BYTES));

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {}
            Err(e) => {
                reap(&mut child, program);
                return Err(RunError::Io(e));
            }
        }
        if Instant::now() >= deadline {
            warn!(program, ?timeout, "Command timed out, killing");
            reap(&mut child, program);
            // Reader threads finish once the pipes close; not joined so a
            // grandchild holding the pipe open cannot stall us
            return Err(RunError::Timeout(timeout));
        }
        thread::sleep(POLL_INTERVAL);
    };

    let stdout = stdout.and_then(|h| h.join().ok()).unwrap_or_default();
    let stderr = stderr.and_then(|h| h.join().ok()).unwrap_or_default();

    Ok(CommandOutput {
        status,
        stdout,
        stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
    })
}

fn drain<R: Read + Send + 'static>(pipe: R, limit: u64) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.take(limit).read_to_end(&mut buf);
        buf
    })
}

/// Kill and reap with a bounded wait
fn reap(child: &mut Child, program: &str) {
    let _ = child.kill();
    let deadline = Instant::now() + REAP_TIMEOUT;
    loop {
        match child.try_wait() {
            Ok(Some(_)) | Err(_) => return,
            Ok(None) if Instant::now() >= deadline => {
                warn!(program, "Child did not exit after kill");
                return;
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
        }
    }
}
