//! Host environment checks run before a build
//!
//! Neither check is required by the engine itself; the CLI exposes them
//! through the `check` command so users find missing tools before waiting
//! on a long build.

use crate::error::ExitCondition;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// live-build release the pipeline was tested against
pub const TESTED_BUILDER_VERSION: &str = "20250505";

/// Commands a build needs, with the Debian package providing each
pub const REQUIRED_TOOLS: &[(&str, &str)] = &[
    ("lb", "live-build"),
    ("debootstrap", "debootstrap"),
    ("xorriso", "xorriso"),
];

#[derive(Debug, Error)]
pub enum PreflightError {
    #[error("Missing required tools (may require root to use): {}", format_missing(.0))]
    MissingTools(Vec<MissingTool>),

    #[error("Failed to run {program} --version: {source}")]
    VersionCheck {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} --version failed with {condition}")]
    VersionFailed {
        program: String,
        condition: ExitCondition,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingTool {
    pub command: String,
    pub package: String,
}

fn format_missing(missing: &[MissingTool]) -> String {
    missing
        .iter()
        .map(|m| format!("{} (package {})", m.command, m.package))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Resolve every command on `PATH`, reporting all missing ones at once
pub fn check_required_tools(tools: &[(&str, &str)]) -> Result<Vec<PathBuf>, PreflightError> {
    let mut found = Vec::with_capacity(tools.len());
    let mut missing = Vec::new();

    for (command, package) in tools {
        match which::which(command) {
            Ok(path) => {
                debug!(command, path = %path.display(), "Found tool");
                found.push(path);
            }
            Err(_) => missing.push(MissingTool {
                command: command.to_string(),
                package: package.to_string(),
            }),
        }
    }

    if missing.is_empty() {
        Ok(found)
    } else {
        Err(PreflightError::MissingTools(missing))
    }
}

/// Installed builder version as reported by `<program> --version`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderVersion {
    pub installed: String,
}

impl BuilderVersion {
    pub fn is_tested(&self) -> bool {
        self.installed == TESTED_BUILDER_VERSION
    }
}

pub async fn builder_version(program: &str) -> Result<BuilderVersion, PreflightError> {
    let output = Command::new(program)
        .arg("--version")
        .output()
        .await
        .map_err(|source| PreflightError::VersionCheck {
            program: program.to_string(),
            source,
        })?;

    let condition = ExitCondition::from(output.status);
    if !condition.success() {
        return Err(PreflightError::VersionFailed {
            program: program.to_string(),
            condition,
        });
    }

    let version = BuilderVersion {
        installed: String::from_utf8_lossy(&output.stdout).trim().to_string(),
    };
    if version.is_tested() {
        info!(program, version = %version.installed, "Builder version is tested");
    } else {
        // Untested is allowed; the build may still work
        warn!(
            program,
            installed = %version.installed,
            tested = TESTED_BUILDER_VERSION,
            "Untested builder version"
        );
    }
    Ok(version)
}
