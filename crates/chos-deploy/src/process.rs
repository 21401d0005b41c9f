//! Subprocess execution with streaming output
//!
//! Output is forwarded to an [`OutputSink`] line by line while the child is
//! still running, so a long `apply` is observable as it happens. Stderr is
//! forwarded too and additionally captured for error reporting.

use crate::error::{DeployError, Result};
use std::io::Write;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Receives subprocess output as it is produced
pub trait OutputSink: Send + Sync {
    fn write_line(&self, line: &str);
}

/// Writes each line to the process stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn write_line(&self, line: &str) {
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{line}");
        let _ = stdout.flush();
    }
}

/// Collects lines in memory
#[derive(Debug, Default, Clone)]
pub struct BufferSink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every line received so far
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// All lines joined with newlines
    pub fn contents(&self) -> String {
        self.lines()
            .into_iter()
            .fold(String::new(), |mut acc, line| {
                acc.push_str(&line);
                acc.push('\n');
                acc
            })
    }

    /// Forward everything captured so far to another sink
    pub fn replay_into(&self, sink: &dyn OutputSink) {
        for line in self.lines() {
            sink.write_line(&line);
        }
    }
}

impl OutputSink for BufferSink {
    fn write_line(&self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }
}

/// Exit status and captured stderr of a finished subprocess
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub status: ExitStatus,
    pub stderr: String,
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Exit code, `None` if terminated by a signal
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }
}

/// Run `program` in `cwd`, relaying output to `sink` until it exits.
///
/// # Returns
/// * `Ok(outcome)` once the process has exited, whatever its status
/// * `Err` if the process could not be spawned or waited on
pub async fn run_streaming(
    program: &Path,
    args: &[&str],
    cwd: &Path,
    sink: &dyn OutputSink,
) -> Result<CommandOutcome> {
    info!(
        cmd = %program.display(),
        args = ?args,
        cwd = %cwd.display(),
        "Running command"
    );

    let mut child = spawn(program, args, cwd).await?;

    let stdout = child.stdout.take().ok_or_else(|| {
        DeployError::io("Failed to capture stdout", std::io::Error::other("not piped"))
    })?;
    let stderr = child.stderr.take().ok_or_else(|| {
        DeployError::io("Failed to capture stderr", std::io::Error::other("not piped"))
    })?;

    let relay_stdout = relay_lines(stdout, |line| sink.write_line(line));

    let relay_stderr = async {
        let mut captured = String::new();
        relay_lines(stderr, |line| {
            sink.write_line(line);
            captured.push_str(line);
            captured.push('\n');
        })
        .await;
        captured
    };

    let (_, stderr, status) = tokio::join!(relay_stdout, relay_stderr, child.wait());
    let status = status.map_err(|e| {
        DeployError::io(format!("Failed waiting for {}", program.display()), e)
    })?;

    debug!(cmd = %program.display(), status = %status, "Command finished");

    Ok(CommandOutcome { status, stderr })
}

/// Feed every line of `reader` to `on_line` until EOF.
///
/// Lines are decoded lossily. The pipe is drained to EOF even after a read
/// error; a closed read end would kill the child with SIGPIPE.
async fn relay_lines<R>(reader: R, mut on_line: impl FnMut(&str))
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => on_line(&String::from_utf8_lossy(trim_line_ending(&buf))),
            Err(e) => {
                warn!(error = %e, "Output relay failed, discarding the rest");
                if let Err(e) = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await {
                    warn!(error = %e, "Failed to drain output");
                }
                break;
            }
        }
    }
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Raw errno for "text file busy"
#[cfg(unix)]
const ETXTBSY: i32 = 26;

/// Spawn attempts while a freshly written executable is still open elsewhere
const SPAWN_ATTEMPTS: u32 = 5;

async fn spawn(program: &Path, args: &[&str], cwd: &Path) -> Result<Child> {
    let mut attempt = 1;
    loop {
        let result = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();

        match result {
            Ok(child) => return Ok(child),
            // A just-extracted binary can briefly be held open by a forked
            // sibling; this never starts the tool, so it is not a retry of it.
            #[cfg(unix)]
            Err(e) if e.raw_os_error() == Some(ETXTBSY) && attempt < SPAWN_ATTEMPTS => {
                debug!(cmd = %program.display(), attempt, "Executable busy, waiting");
                tokio::time::sleep(Duration::from_millis(50 * u64::from(attempt))).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(DeployError::io(
                    format!("Failed to spawn {}", program.display()),
                    e,
                ));
            }
        }
    }
}
