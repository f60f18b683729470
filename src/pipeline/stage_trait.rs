use super::state::PipelineState;
use crate::error::BuildError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// One ordered phase of the build pipeline.
///
/// Stages are built once per orchestrator and keep no state between runs
/// apart from the working directory assigned by [`Stage::set_target`].
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Text of the `Start` event published when the stage begins
    fn description(&self) -> &'static str;

    /// Orchestrator state while this stage runs
    fn state(&self) -> PipelineState;

    fn set_target(&mut self, target: &Path);

    async fn run(&self) -> Result<(), BuildError>;
}

/// Working directory holder shared by the built-in stages
#[derive(Debug, Clone, Default)]
pub(crate) struct Target(Option<PathBuf>);

impl Target {
    pub(crate) fn set(&mut self, path: &Path) {
        self.0 = Some(path.to_path_buf());
    }

    pub(crate) fn get(&self, stage: &'static str) -> Result<&Path, BuildError> {
        self.0.as_deref().ok_or(BuildError::PathNotSet { stage })
    }
}
