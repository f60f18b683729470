mod collect;
mod configure;
mod import;
mod invoke;

pub use collect::CollectArtifactsStage;
pub use configure::{configure_command, load_template, ConfigureStage};
pub use import::{ImportStage, PACKAGE_LIST_PATH, SPLASH_DIR};
pub use invoke::InvokeBuilderStage;

use super::context::StageContext;
use super::stage_trait::Stage;

/// The fixed stage order: configure, import, build, collect
pub fn default_stages(ctx: &StageContext) -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(ConfigureStage::new(ctx.clone())),
        Box::new(ImportStage::new(ctx.clone())),
        Box::new(InvokeBuilderStage::new(ctx.clone())),
        Box::new(CollectArtifactsStage::new(ctx.clone())),
    ]
}
