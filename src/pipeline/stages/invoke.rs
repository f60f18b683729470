use crate::error::BuildError;
use crate::pipeline::context::StageContext;
use crate::pipeline::stage_trait::{Stage, Target};
use crate::pipeline::state::PipelineState;
use async_trait::async_trait;
use std::path::Path;
use tracing::info;

const NAME: &str = "invoke_builder";

/// Runs the builder's build verb (`lb build`) in the working directory
pub struct InvokeBuilderStage {
    ctx: StageContext,
    target: Target,
}

impl InvokeBuilderStage {
    pub fn new(ctx: StageContext) -> Self {
        Self {
            ctx,
            target: Target::default(),
        }
    }

    fn argv(&self) -> Vec<String> {
        let builder = &self.ctx.config.builder;
        vec![builder.program.clone(), builder.build_verb.clone()]
    }
}

#[async_trait]
impl Stage for InvokeBuilderStage {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Building image\n"
    }

    fn state(&self) -> PipelineState {
        PipelineState::InvokingBuilder
    }

    fn set_target(&mut self, target: &Path) {
        self.target.set(target);
    }

    async fn run(&self) -> Result<(), BuildError> {
        let dir = self.target.get(NAME)?;
        let argv = self.argv();

        info!(command = %argv.join(" "), dir = %dir.display(), "Invoking builder");
        self.ctx.run_command(&argv, dir).await?;
        self.ctx.publish("Builder finished\n");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;
    use crate::error::ExitCondition;
    use crate::process::{MockOutcome, MockRunner};
    use crate::progress::EventBus;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_runs_build_verb() {
        let dir = TempDir::new().unwrap();
        let runner = Arc::new(MockRunner::new());
        let mut stage = InvokeBuilderStage::new(StageContext::new(
            Arc::new(BuildConfig::default()),
            Arc::new(EventBus::new()),
            runner.clone(),
        ));
        stage.set_target(dir.path());

        stage.run().await.unwrap();
        assert_eq!(runner.calls_matching(&["lb", "build"]), 1);
    }

    #[tokio::test]
    async fn test_custom_program_and_signal_failure() {
        let dir = TempDir::new().unwrap();
        let runner = Arc::new(MockRunner::new());
        runner.add_outcome(MockOutcome {
            exit: ExitCondition::Signal(9),
            ..MockOutcome::success()
        });
        let mut stage = InvokeBuilderStage::new(StageContext::new(
            Arc::new(BuildConfig::default().with_program("/opt/lb/bin/lb")),
            Arc::new(EventBus::new()),
            runner.clone(),
        ));
        stage.set_target(dir.path());

        match stage.run().await {
            Err(BuildError::ProcessExitFailure {
                program, condition, ..
            }) => {
                assert_eq!(program, "/opt/lb/bin/lb");
                assert_eq!(condition, ExitCondition::Signal(9));
            }
            other => panic!("Expected ProcessExitFailure, got {:?}", other),
        }
    }
}
