//! The build pipeline: configure, import, invoke builder, collect artifacts

pub mod context;
pub mod orchestrator;
pub mod stage_trait;
pub mod stages;
pub mod state;

pub use context::{BuildRun, StageContext};
pub use orchestrator::Orchestrator;
pub use stage_trait::Stage;
pub use state::PipelineState;
