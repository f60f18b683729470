//! Running external commands
//!
//! [`SystemRunner`] spawns the real process; [`MockRunner`] is a spy used by
//! tests and by callers that want to dry-run a pipeline.

mod mock;
mod runner;

pub use mock::{MockOutcome, MockRunner, RecordedCall};
pub use runner::{CommandRunner, OutputRecord, OutputSink, OutputStream, SystemRunner};
