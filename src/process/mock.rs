//! Scriptable [`CommandRunner`] for tests

use super::runner::{CommandRunner, OutputRecord, OutputSink};
use crate::error::{BuildError, ExitCondition, IoResultExt};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// One invocation seen by [`MockRunner`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub argv: Vec<String>,
    pub working_dir: PathBuf,
}

impl RecordedCall {
    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or("")
    }
}

/// Scripted result of one invocation
#[derive(Debug, Clone)]
pub struct MockOutcome {
    pub output: Vec<OutputRecord>,
    pub exit: ExitCondition,
    /// Files written relative to the working directory before "exiting"
    pub files: Vec<(PathBuf, Vec<u8>)>,
    pub fail_to_start: bool,
}

impl MockOutcome {
    pub fn success() -> Self {
        Self {
            output: Vec::new(),
            exit: ExitCondition::Code(0),
            files: Vec::new(),
            fail_to_start: false,
        }
    }

    pub fn exit_code(code: i32) -> Self {
        Self {
            exit: ExitCondition::Code(code),
            ..Self::success()
        }
    }

    pub fn start_failure() -> Self {
        Self {
            fail_to_start: true,
            ..Self::success()
        }
    }

    pub fn with_stdout(mut self, line: impl Into<String>) -> Self {
        self.output.push(OutputRecord::stdout(line));
        self
    }

    pub fn with_stderr(mut self, line: impl Into<String>) -> Self {
        self.output.push(OutputRecord::stderr(line));
        self
    }

    pub fn with_file(mut self, relative: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        self.files.push((relative.into(), contents.into()));
        self
    }
}

/// Spy runner: records every call and replays queued outcomes in order.
///
/// Once the queue is empty every call succeeds silently.
pub struct MockRunner {
    outcomes: Mutex<VecDeque<MockOutcome>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn add_outcome(&self, outcome: MockOutcome) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn add_outcomes(&self, outcomes: impl IntoIterator<Item = MockOutcome>) {
        let mut queue = self.outcomes.lock().unwrap();
        queue.extend(outcomes);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Calls whose argv matches `argv` exactly
    pub fn calls_matching(&self, argv: &[&str]) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.argv.iter().map(String::as_str).eq(argv.iter().copied()))
            .count()
    }
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(
        &self,
        argv: &[String],
        working_dir: &Path,
        sink: OutputSink,
    ) -> Result<ExitCondition, BuildError> {
        let program = argv.first().cloned().ok_or(BuildError::EmptyCommand)?;
        self.calls.lock().unwrap().push(RecordedCall {
            argv: argv.to_vec(),
            working_dir: working_dir.to_path_buf(),
        });

        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(MockOutcome::success);

        if outcome.fail_to_start {
            return Err(BuildError::ProcessStartFailure {
                program,
                source: io::Error::new(io::ErrorKind::NotFound, "mock start failure"),
            });
        }

        for (relative, contents) in &outcome.files {
            let path = working_dir.join(relative);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await.with_path(parent)?;
            }
            tokio::fs::write(&path, contents).await.with_path(&path)?;
        }

        for record in &outcome.output {
            sink.emit(record.clone());
        }

        if outcome.exit.success() {
            Ok(outcome.exit)
        } else {
            Err(BuildError::ProcessExitFailure {
                program,
                condition: outcome.exit,
                tail: outcome.output.iter().map(|r| r.line.clone()).collect(),
            })
        }
    }
}
