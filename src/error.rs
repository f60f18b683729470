//! Error types for the build engine
//!
//! Every stage returns [`BuildError`] to the orchestrator unchanged, so the
//! variants double as the user-visible failure summary published in the
//! final `End` event.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// How an external process terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCondition {
    /// Normal exit with a status code
    Code(i32),
    /// Terminated by a signal (unix only)
    Signal(i32),
    /// Platform reported neither a code nor a signal
    Unknown,
}

impl ExitCondition {
    pub fn success(&self) -> bool {
        matches!(self, ExitCondition::Code(0))
    }
}

impl From<std::process::ExitStatus> for ExitCondition {
    fn from(status: std::process::ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return ExitCondition::Code(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return ExitCondition::Signal(signal);
            }
        }
        ExitCondition::Unknown
    }
}

impl fmt::Display for ExitCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitCondition::Code(code) => write!(f, "exit code {}", code),
            ExitCondition::Signal(signal) => write!(f, "killed by signal {}", signal),
            ExitCondition::Unknown => write!(f, "unknown exit condition"),
        }
    }
}

/// Errors produced by the tokenizer, the process runner and the pipeline stages
#[derive(Debug, Error)]
pub enum BuildError {
    /// Command text produced no tokens
    #[error("Command is empty")]
    EmptyCommand,

    /// A stage ran before the orchestrator assigned its working directory
    #[error("Working directory not set for stage {stage}")]
    PathNotSet { stage: &'static str },

    /// Output pipes could not be attached to the spawned process
    #[error("Failed to capture {stream} of {program}")]
    PipeFailure { program: String, stream: &'static str },

    /// The process could not be started at all
    #[error("Failed to start {program}: {source}")]
    ProcessStartFailure {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The process ran but did not exit successfully
    #[error("{program} failed with {condition}{}", format_tail(.tail))]
    ProcessExitFailure {
        program: String,
        condition: ExitCondition,
        tail: Vec<String>,
    },

    /// The process exceeded the configured time limit and was killed
    #[error("{program} did not finish within {}s and was killed", .limit.as_secs())]
    ProcessTimeout { program: String, limit: Duration },

    /// File copy/read/write failure during import or artifact collection
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Placeholder substitution failed
    #[error("Template error: {0}")]
    Template(String),

    /// Wiping the working directory would delete collected artifacts
    #[error(
        "Working directory {} contains the artifact directory {}",
        .dir.display(),
        .artifact_dir.display()
    )]
    WorkingDirHoldsArtifacts { dir: PathBuf, artifact_dir: PathBuf },

    /// A custom file declared a destination outside the working directory
    #[error("Custom file {} declares invalid destination '{destination}'", .source_file.display())]
    InvalidDestination {
        source_file: PathBuf,
        destination: String,
    },
}

impl BuildError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        BuildError::Io {
            path: path.into(),
            source,
        }
    }
}

fn format_tail(tail: &[String]) -> String {
    if tail.is_empty() {
        String::new()
    } else {
        format!("\n  last output:\n    {}", tail.join("\n    "))
    }
}

/// Attaches a path to `io::Error` results
pub(crate) trait IoResultExt<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T, BuildError>;
}

impl<T> IoResultExt<T> for Result<T, io::Error> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T, BuildError> {
        self.map_err(|e| BuildError::io(path, e))
    }
}
