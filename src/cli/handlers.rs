//! Command handlers; each returns the process exit code

use super::commands::{BuildArgs, CheckArgs, RenderArgs};
use super::output::{format_argv, ConsoleHandler, OutputFormat};
use crate::config::BuildConfig;
use crate::pipeline::stages::configure_command;
use crate::pipeline::Orchestrator;
use crate::preflight::{self, REQUIRED_TOOLS};
use crate::progress::{self, LoggingHandler, NoOpHandler, ProgressHandler};
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};

pub async fn handle_build(args: &BuildArgs, quiet: bool, verbose: bool) -> i32 {
    match run_build(args, quiet, verbose).await {
        Ok(dir) => {
            info!(dir = %dir.display(), "Build succeeded");
            0
        }
        Err(e) => {
            error!("Build failed: {:#}", e);
            1
        }
    }
}

async fn run_build(args: &BuildArgs, quiet: bool, verbose: bool) -> Result<PathBuf> {
    let config = args.apply(
        BuildConfig::load(args.config.as_deref()).context("Failed to load configuration")?,
    );
    config.validate().context("Invalid configuration")?;
    if let Some(dir) = &args.workdir {
        guard_workdir(dir)?;
    }
    debug!(?config, "Resolved configuration");

    let mut orchestrator = Orchestrator::new(config);

    let console: Arc<dyn ProgressHandler> = if quiet {
        Arc::new(NoOpHandler)
    } else {
        Arc::new(ConsoleHandler::new(args.format.into()))
    };
    let mut relays = vec![progress::forward(orchestrator.subscribe(), console)];
    if verbose {
        relays.push(progress::forward(
            orchestrator.subscribe(),
            Arc::new(LoggingHandler),
        ));
    }

    let result = orchestrator.build(args.workdir.as_deref()).await;

    // Dropping the orchestrator closes the bus so the relays drain and exit
    drop(orchestrator);
    for relay in relays {
        let handled = relay.await.context("Progress relay failed")?;
        debug!(events = handled, "Progress relay finished");
    }

    Ok(result?)
}

/// Refuse working directories whose wipe would be catastrophic
fn guard_workdir(dir: &Path) -> Result<()> {
    let resolved = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
    let home = dirs::home_dir().map(|h| h.canonicalize().unwrap_or(h));
    if resolved.parent().is_none() || home.as_deref() == Some(resolved.as_path()) {
        bail!(
            "Refusing to use {} as working directory: it is emptied before every build",
            dir.display()
        );
    }
    Ok(())
}

pub async fn handle_check(args: &CheckArgs, quiet: bool) -> i32 {
    let config = match BuildConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return 1;
        }
    };
    let program = args.builder.clone().unwrap_or(config.builder.program);
    let mut exit_code = 0;

    match preflight::check_required_tools(REQUIRED_TOOLS) {
        Ok(found) => {
            if !quiet {
                for path in found {
                    println!("found    {}", path.display());
                }
            }
        }
        Err(e) => {
            eprintln!("{}", e);
            exit_code = 1;
        }
    }

    match preflight::builder_version(&program).await {
        Ok(version) if version.is_tested() => {
            if !quiet {
                println!("version  {} (tested)", version.installed);
            }
        }
        Ok(version) => {
            println!(
                "version  {} (untested, tested version is {})",
                version.installed,
                preflight::TESTED_BUILDER_VERSION
            );
        }
        Err(e) => {
            eprintln!("{}", e);
            exit_code = 1;
        }
    }

    exit_code
}

pub async fn handle_render(args: &RenderArgs) -> i32 {
    match run_render(args).await {
        Ok(output) => {
            println!("{}", output);
            0
        }
        Err(e) => {
            error!("Render failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            1
        }
    }
}

async fn run_render(args: &RenderArgs) -> Result<String> {
    let config = args.apply(
        BuildConfig::load(args.config.as_deref()).context("Failed to load configuration")?,
    );
    let command = configure_command(&config)
        .await
        .context("Failed to render configure command")?;
    let argv = command.argv();

    Ok(match OutputFormat::from(args.format) {
        OutputFormat::Human => format_argv(&argv),
        OutputFormat::Json => {
            serde_json::to_string_pretty(&argv).context("Failed to serialize argv")?
        }
    })
}
