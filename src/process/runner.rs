//! External process execution with concurrent stdout/stderr capture

use crate::error::{BuildError, ExitCondition};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Lines of output kept per stream for failure reports
const TAIL_LINES: usize = 20;

/// Which pipe a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    fn as_str(&self) -> &'static str {
        match self {
            OutputStream::Stdout => "stdout",
            OutputStream::Stderr => "stderr",
        }
    }
}

/// One captured line of process output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputRecord {
    pub stream: OutputStream,
    pub line: String,
}

impl OutputRecord {
    pub fn stdout(line: impl Into<String>) -> Self {
        Self {
            stream: OutputStream::Stdout,
            line: line.into(),
        }
    }

    pub fn stderr(line: impl Into<String>) -> Self {
        Self {
            stream: OutputStream::Stderr,
            line: line.into(),
        }
    }
}

/// Bounded, lossy side channel for output records.
///
/// A full queue drops the line instead of blocking, so backpressure never
/// reaches the external process.
#[derive(Debug, Clone)]
pub struct OutputSink {
    sender: mpsc::Sender<OutputRecord>,
}

impl OutputSink {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<OutputRecord>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Sink whose records go nowhere
    pub fn discard() -> Self {
        Self::channel(1).0
    }

    /// Queue a record; returns false if it was dropped
    pub fn emit(&self, record: OutputRecord) -> bool {
        match self.sender.try_send(record) {
            Ok(()) => true,
            Err(TrySendError::Full(record)) => {
                warn!(stream = record.stream.as_str(), line = %record.line, "Output queue full, dropping line");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

/// Runs one external command to completion
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `argv` in `working_dir`, streaming its output into `sink`.
    ///
    /// Succeeds only on a zero exit; every other termination is an error
    /// carrying the exit condition.
    async fn run(
        &self,
        argv: &[String],
        working_dir: &Path,
        sink: OutputSink,
    ) -> Result<ExitCondition, BuildError>;
}

/// [`CommandRunner`] backed by real OS processes
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    timeout: Option<Duration>,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill invocations that run longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(
        &self,
        argv: &[String],
        working_dir: &Path,
        sink: OutputSink,
    ) -> Result<ExitCondition, BuildError> {
        let (program, args) = argv.split_first().ok_or(BuildError::EmptyCommand)?;
        info!(program = %program, args = ?args, dir = %working_dir.display(), "Executing command");

        let mut child = Command::new(program)
            .args(args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| BuildError::ProcessStartFailure {
                program: program.clone(),
                source,
            })?;

        let stdout = child.stdout.take().ok_or_else(|| BuildError::PipeFailure {
            program: program.clone(),
            stream: "stdout",
        })?;
        let stderr = child.stderr.take().ok_or_else(|| BuildError::PipeFailure {
            program: program.clone(),
            stream: "stderr",
        })?;

        // Both readers must be running before anything waits on the child
        let mut stdout_task = tokio::spawn(read_lines(stdout, OutputStream::Stdout, sink.clone()));
        let mut stderr_task = tokio::spawn(read_lines(stderr, OutputStream::Stderr, sink));

        let finished = match self.timeout {
            None => drain_then_wait(&mut child, &mut stdout_task, &mut stderr_task).await,
            Some(limit) => {
                let pending = drain_then_wait(&mut child, &mut stdout_task, &mut stderr_task);
                match tokio::time::timeout(limit, pending).await {
                    Ok(finished) => finished,
                    Err(_) => {
                        warn!(program = %program, limit_secs = limit.as_secs(), "Command timed out, killing it");
                        stdout_task.abort();
                        stderr_task.abort();
                        if let Err(e) = child.kill().await {
                            warn!(program = %program, error = %e, "Failed to kill timed out command");
                        }
                        return Err(BuildError::ProcessTimeout {
                            program: program.clone(),
                            limit,
                        });
                    }
                }
            }
        };

        let (status, stdout_tail, stderr_tail) =
            finished.map_err(|e| BuildError::io(PathBuf::from(program), e))?;
        let condition = ExitCondition::from(status);
        debug!(program = %program, condition = %condition, "Command finished");

        if condition.success() {
            return Ok(condition);
        }

        let tail = if stderr_tail.is_empty() {
            stdout_tail
        } else {
            stderr_tail
        };
        Err(BuildError::ProcessExitFailure {
            program: program.clone(),
            condition,
            tail,
        })
    }
}

/// Wait for both readers to hit end-of-stream, then reap the child
async fn drain_then_wait(
    child: &mut Child,
    stdout_task: &mut JoinHandle<Vec<String>>,
    stderr_task: &mut JoinHandle<Vec<String>>,
) -> std::io::Result<(ExitStatus, Vec<String>, Vec<String>)> {
    let (stdout_tail, stderr_tail) = tokio::join!(stdout_task, stderr_task);
    let status = child.wait().await?;
    Ok((
        status,
        stdout_tail.unwrap_or_else(|e| reader_failed("stdout", e)),
        stderr_tail.unwrap_or_else(|e| reader_failed("stderr", e)),
    ))
}

fn reader_failed(stream: &str, error: tokio::task::JoinError) -> Vec<String> {
    warn!(stream, error = %error, "Output reader task failed");
    Vec::new()
}

/// Forward every line of `reader` to `sink`, returning the last few lines
async fn read_lines<R>(reader: R, stream: OutputStream, sink: OutputSink) -> Vec<String>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut tail = VecDeque::with_capacity(TAIL_LINES);

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(strip_newline(&buf)).into_owned();
                if tail.len() == TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line.clone());
                sink.emit(OutputRecord { stream, line });
            }
            Err(e) => {
                warn!(stream = stream.as_str(), error = %e, "Error reading command output");
                break;
            }
        }
    }

    tail.into()
}

fn strip_newline(buf: &[u8]) -> &[u8] {
    let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
    buf.strip_suffix(b"\r").unwrap_or(buf)
}
