pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{BuildArgs, CheckArgs, CliArgs, Commands, RenderArgs};
pub use output::{ConsoleHandler, OutputFormat};
