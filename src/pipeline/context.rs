//! Shared dependencies handed to every stage, and the per-build record

use crate::config::BuildConfig;
use crate::error::{BuildError, ExitCondition};
use crate::process::{CommandRunner, OutputRecord, OutputSink, OutputStream};
use crate::progress::{EventBus, ProgressEvent};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Long-lived dependencies owned by the orchestrator and shared with stages
#[derive(Clone)]
pub struct StageContext {
    /// Engine configuration
    pub config: Arc<BuildConfig>,

    /// Progress fan-out
    pub bus: Arc<EventBus>,

    /// External command execution
    pub runner: Arc<dyn CommandRunner>,
}

impl StageContext {
    pub fn new(
        config: Arc<BuildConfig>,
        bus: Arc<EventBus>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            config,
            bus,
            runner,
        }
    }

    /// Publish an `Append` update
    pub fn publish(&self, message: impl Into<String>) {
        self.bus.publish(ProgressEvent::update(message));
    }

    /// Run `argv` in `dir`, relaying its output to the bus as updates.
    ///
    /// Returns after the relay has published every record the runner kept.
    pub async fn run_command(
        &self,
        argv: &[String],
        dir: &Path,
    ) -> Result<ExitCondition, BuildError> {
        let (sink, mut records) = OutputSink::channel(self.config.builder.output_capacity);

        let bus = Arc::clone(&self.bus);
        let relay = tokio::spawn(async move {
            while let Some(record) = records.recv().await {
                bus.publish(ProgressEvent::update(render_record(&record)));
            }
        });

        let result = self.runner.run(argv, dir, sink).await;

        if let Err(e) = relay.await {
            warn!(error = %e, "Output relay task failed");
        }
        result
    }
}

fn render_record(record: &OutputRecord) -> String {
    match record.stream {
        OutputStream::Stdout => format!("{}\n", record.line),
        OutputStream::Stderr => format!("stderr: {}\n", record.line),
    }
}

/// Context of one `build()` call; discarded when it returns
#[derive(Debug, Clone)]
pub struct BuildRun {
    pub id: Uuid,
    /// Set once initialization has prepared the directory
    pub working_dir: Option<PathBuf>,
    pub failure: Option<String>,
}

impl BuildRun {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            working_dir: None,
            failure: None,
        }
    }

    /// Summary text for the final `End` event
    pub fn summary(&self) -> String {
        match (&self.failure, &self.working_dir) {
            (Some(reason), _) => format!("Build failed: {}\n", reason),
            (None, Some(dir)) => format!("Build finished in {}\n", dir.display()),
            (None, None) => "Build finished\n".to_string(),
        }
    }
}
