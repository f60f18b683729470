//! livebuilder - build orchestration engine for custom live-build images
//!
//! The engine drives Debian `live-build` through a fixed pipeline while
//! streaming progress to any number of independent subscribers.
//!
//! # Core Concepts
//!
//! - **Orchestrator**: owns the event bus and the ordered stages, runs one
//!   build at a time and publishes exactly one `End` event per build
//! - **Stages**: configure, import assets, invoke the builder, collect
//!   artifacts; the first failure stops the pipeline
//! - **Process runner**: spawns external commands and drains stdout and
//!   stderr concurrently before waiting for exit
//! - **Event bus**: bounded, lossy fan-out of progress events; a slow
//!   subscriber never stalls the build
//!
//! # Example Usage
//!
//! ```no_run
//! use livebuilder::{BuildConfig, Orchestrator};
//! use livebuilder::progress::{forward, LoggingHandler};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BuildConfig::load(None)?.with_package_list("desktop.list");
//! let mut orchestrator = Orchestrator::new(config);
//! let relay = forward(orchestrator.subscribe(), Arc::new(LoggingHandler));
//!
//! let workdir = orchestrator.build(None).await?;
//! println!("Built in {}", workdir.display());
//!
//! drop(orchestrator);
//! relay.await?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod command;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod preflight;
pub mod process;
pub mod progress;
pub mod util;

pub use config::{BuildConfig, ConfigError, ImageLabels};
pub use error::{BuildError, ExitCondition};
pub use pipeline::{Orchestrator, PipelineState};
pub use preflight::PreflightError;
pub use progress::{EventBus, ProgressEvent, Subscription};
pub use util::{init_default, init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
