use super::context::{BuildRun, StageContext};
use super::stage_trait::Stage;
use super::stages::default_stages;
use super::state::PipelineState;
use crate::config::{app_data_dir, BuildConfig};
use crate::error::{BuildError, IoResultExt};
use crate::process::{CommandRunner, SystemRunner};
use crate::progress::{EventBus, ProgressEvent, Subscription};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Drives one build at a time through the fixed stage sequence and reports
/// progress on its event bus.
pub struct Orchestrator {
    config: Arc<BuildConfig>,
    bus: Arc<EventBus>,
    stages: Vec<Box<dyn Stage>>,
    state: PipelineState,
}

impl Orchestrator {
    /// Orchestrator that runs real processes
    pub fn new(config: BuildConfig) -> Self {
        let runner = SystemRunner::new().with_timeout(config.builder.process_timeout());
        Self::with_runner(config, Arc::new(runner))
    }

    pub fn with_runner(config: BuildConfig, runner: Arc<dyn CommandRunner>) -> Self {
        let config = Arc::new(config);
        let bus = Arc::new(EventBus::with_capacity(config.subscriber_capacity));
        let ctx = StageContext::new(Arc::clone(&config), Arc::clone(&bus), runner);
        let stages = default_stages(&ctx);

        Self {
            config,
            bus,
            stages,
            state: PipelineState::Idle,
        }
    }

    /// New subscriber; sees only events published from now on
    pub fn subscribe(&self) -> Subscription {
        self.bus.subscribe()
    }

    /// Shared handle to the bus, for subscribing while a build is running
    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.bus)
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Run the whole pipeline in `target`, or in a fresh temp directory.
    ///
    /// Any existing contents of the directory are deleted first. Returns the
    /// working directory on success; on failure the first stage error is
    /// returned unchanged and no later stage runs. Either way exactly one
    /// `End` event is published.
    pub async fn build(&mut self, target: Option<&Path>) -> Result<PathBuf, BuildError> {
        let run = BuildRun::new(Uuid::new_v4());
        let span = info_span!("build", run_id = %run.id);
        self.execute(run, target).instrument(span).await
    }

    async fn execute(
        &mut self,
        mut run: BuildRun,
        target: Option<&Path>,
    ) -> Result<PathBuf, BuildError> {
        let started = Instant::now();
        info!(target = ?target, "Starting build");

        let result = self.run_stages(&mut run, target).await;

        match &result {
            Ok(_) => {
                advance(&mut self.state, PipelineState::Done);
                info!(elapsed_secs = started.elapsed().as_secs(), "Build complete");
            }
            Err(e) => {
                error!(state = %self.state, error = %e, "Build failed");
                advance(&mut self.state, PipelineState::Failed);
                run.failure = Some(e.to_string());
            }
        }
        self.bus.publish(ProgressEvent::end(run.summary()));

        result
    }

    async fn run_stages(
        &mut self,
        run: &mut BuildRun,
        target: Option<&Path>,
    ) -> Result<PathBuf, BuildError> {
        advance(&mut self.state, PipelineState::Initializing);
        self.bus
            .publish(ProgressEvent::start("Preparing working directory\n"));
        let dir = prepare_working_dir(target, &self.config.output.artifact_dir).await?;
        info!(dir = %dir.display(), "Working directory ready");
        run.working_dir = Some(dir.clone());

        for stage in self.stages.iter_mut() {
            stage.set_target(&dir);
        }

        for stage in &self.stages {
            advance(&mut self.state, stage.state());
            info!(stage = stage.name(), "Stage started");
            self.bus.publish(ProgressEvent::start(stage.description()));

            let stage_start = Instant::now();
            stage.run().await?;
            debug!(
                stage = stage.name(),
                elapsed_ms = stage_start.elapsed().as_millis() as u64,
                "Stage complete"
            );
        }
        Ok(dir)
    }
}

fn advance(state: &mut PipelineState, next: PipelineState) {
    debug_assert!(
        state.can_transition_to(next),
        "invalid transition {} -> {}",
        state,
        next
    );
    debug!(from = %state, to = %next, "State transition");
    *state = next;
}

/// Resolve the working directory and leave it empty.
///
/// Refuses a directory that is, or lies above, the artifact directory.
async fn prepare_working_dir(
    target: Option<&Path>,
    artifact_dir: &Path,
) -> Result<PathBuf, BuildError> {
    let dir = match target {
        Some(path) => path.to_path_buf(),
        None => allocate_temp_dir(),
    };

    if resolve_path(artifact_dir).starts_with(resolve_path(&dir)) {
        return Err(BuildError::WorkingDirHoldsArtifacts {
            dir,
            artifact_dir: artifact_dir.to_path_buf(),
        });
    }

    match tokio::fs::remove_dir_all(&dir).await {
        Ok(()) => debug!(dir = %dir.display(), "Removed previous build"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(BuildError::io(dir, e)),
    }
    tokio::fs::create_dir_all(&dir).await.with_path(&dir)?;
    Ok(dir)
}

/// Canonical form of `path`, which need not exist yet.
///
/// The deepest existing ancestor is canonicalized and the rest re-appended.
fn resolve_path(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut missing = Vec::new();
    loop {
        let candidate = if existing.as_os_str().is_empty() {
            Path::new(".")
        } else {
            existing
        };
        if let Ok(mut resolved) = candidate.canonicalize() {
            resolved.extend(missing.iter().rev());
            return resolved;
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name);
                existing = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}

fn allocate_temp_dir() -> PathBuf {
    match tempfile::Builder::new().prefix("livebuilder-").tempdir() {
        Ok(dir) => dir.keep(),
        Err(e) => {
            let fallback = app_data_dir().join("build");
            warn!(error = %e, fallback = %fallback.display(), "Could not allocate temp directory");
            fallback
        }
    }
}
