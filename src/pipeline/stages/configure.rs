//! Configure stage: render the configure template and run it

use crate::command::{parse_command, render, CommandLine, DEFAULT_CONFIGURE_TEMPLATE};
use crate::config::{BuildConfig, BuilderSettings};
use crate::error::{BuildError, IoResultExt};
use crate::pipeline::context::StageContext;
use crate::pipeline::stage_trait::{Stage, Target};
use crate::pipeline::state::PipelineState;
use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info};

const NAME: &str = "configure";

pub struct ConfigureStage {
    ctx: StageContext,
    target: Target,
}

impl ConfigureStage {
    pub fn new(ctx: StageContext) -> Self {
        Self {
            ctx,
            target: Target::default(),
        }
    }
}

/// Template file, then inline template, then the built-in default
pub async fn load_template(builder: &BuilderSettings) -> Result<String, BuildError> {
    if let Some(path) = &builder.configure_template_file {
        debug!(path = %path.display(), "Reading configure template");
        return tokio::fs::read_to_string(path).await.with_path(path);
    }
    Ok(builder
        .configure_template
        .clone()
        .unwrap_or_else(|| DEFAULT_CONFIGURE_TEMPLATE.to_string()))
}

/// The configure command for `config`, rendered and tokenized
pub async fn configure_command(config: &BuildConfig) -> Result<CommandLine, BuildError> {
    let template = load_template(&config.builder).await?;
    let rendered = render(&template, &config.image)?;
    parse_command(&rendered)
}

#[async_trait]
impl Stage for ConfigureStage {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Configuring live-build\n"
    }

    fn state(&self) -> PipelineState {
        PipelineState::Configuring
    }

    fn set_target(&mut self, target: &Path) {
        self.target.set(target);
    }

    async fn run(&self) -> Result<(), BuildError> {
        let dir = self.target.get(NAME)?;

        let command = configure_command(&self.ctx.config).await?;
        let argv = command.argv();

        info!(program = %command.program, args = command.args.len(), "Configuring builder");
        self.ctx.publish(format!("Running: {}\n", argv.join(" ")));
        self.ctx.run_command(&argv, dir).await?;
        Ok(())
    }
}
