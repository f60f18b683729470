//! Configuration management for livebuilder
//!
//! A [`BuildConfig`] is the single object handed to the orchestrator at
//! construction time. It is assembled in layers: built-in defaults, an
//! optional TOML file, environment variables, and finally CLI flags.
//!
//! # Environment Variables
//!
//! - `LIVEBUILDER_TEMPLATE`: Path to a configure-command template file
//! - `LIVEBUILDER_OUTPUT_DIR`: Directory that receives collected artifacts
//! - `LIVEBUILDER_BUILDER`: Builder program name - default: "lb"
//! - `LIVEBUILDER_PROCESS_TIMEOUT`: Per-invocation timeout in seconds - default: none
//! - `LIVEBUILDER_LOG_LEVEL`: Logging level - default: "info" (read by the binary)
//!
//! # Example
//!
//! ```toml
//! subscriber_capacity = 100
//!
//! [image]
//! volume = "Debian Live"
//! publisher = "Example Org"
//!
//! [builder]
//! configure_template_file = "/etc/livebuilder/lbconfig.template"
//! process_timeout_secs = 7200
//!
//! [assets]
//! custom_files = ["assets/motd.txt"]
//! package_lists = ["assets/desktop.list"]
//! splash_images = ["assets/splash.png"]
//!
//! [output]
//! artifact_dir = "/srv/isos"
//! ```

use crate::command::normalize_label;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_PROGRAM: &str = "lb";
const DEFAULT_BUILD_VERB: &str = "build";
const DEFAULT_ARTIFACT_EXTENSION: &str = "iso";
const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Failed to parse an environment override
    #[error("Failed to parse {field}: {error}")]
    ParseError { field: String, error: String },

    /// A selected asset does not exist
    #[error("Asset not found: {}", .0.display())]
    MissingAsset(PathBuf),

    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Labels substituted into the configure template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageLabels {
    pub volume: String,
    pub publisher: String,
    pub application: String,
    pub image_name: String,
}

impl Default for ImageLabels {
    fn default() -> Self {
        Self {
            volume: "DefaultVolume".to_string(),
            publisher: "DefaultPublisher".to_string(),
            application: "DefaultApplication".to_string(),
            image_name: "DefaultImage".to_string(),
        }
    }
}

impl ImageLabels {
    /// Placeholder name and value of every label
    pub fn fields(&self) -> [(&'static str, &str); 4] {
        [
            ("volume", self.volume.as_str()),
            ("publisher", self.publisher.as_str()),
            ("application", self.application.as_str()),
            ("image_name", self.image_name.as_str()),
        ]
    }
}

/// How the external builder is invoked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderSettings {
    /// Builder executable
    pub program: String,

    /// Verb passed to the builder for the build stage
    pub build_verb: String,

    /// Inline configure-command template
    pub configure_template: Option<String>,

    /// Template file; takes precedence over the inline template
    pub configure_template_file: Option<PathBuf>,

    /// Upper bound for each external invocation; `None` waits forever
    pub process_timeout_secs: Option<u64>,

    /// Capacity of the per-invocation output record queue
    pub output_capacity: usize,
}

impl Default for BuilderSettings {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            build_verb: DEFAULT_BUILD_VERB.to_string(),
            configure_template: None,
            configure_template_file: None,
            process_timeout_secs: None,
            output_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl BuilderSettings {
    pub fn process_timeout(&self) -> Option<Duration> {
        self.process_timeout_secs.map(Duration::from_secs)
    }
}

/// User-selected assets imported into the working tree, in order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetSelection {
    pub custom_files: Vec<PathBuf>,
    pub package_lists: Vec<PathBuf>,
    pub splash_images: Vec<PathBuf>,
}

impl AssetSelection {
    pub fn is_empty(&self) -> bool {
        self.custom_files.is_empty() && self.package_lists.is_empty() && self.splash_images.is_empty()
    }

    fn all(&self) -> impl Iterator<Item = &PathBuf> {
        self.custom_files
            .iter()
            .chain(self.package_lists.iter())
            .chain(self.splash_images.iter())
    }
}

/// Where collected artifacts end up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub artifact_dir: PathBuf,
    pub artifact_extension: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            artifact_dir: default_artifact_dir(),
            artifact_extension: DEFAULT_ARTIFACT_EXTENSION.to_string(),
        }
    }
}

/// Default artifact location: `<data dir>/livebuilder/isos`
pub fn default_artifact_dir() -> PathBuf {
    app_data_dir().join("isos")
}

/// Per-user application directory
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(env::temp_dir)
        .join("livebuilder")
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub image: ImageLabels,
    pub builder: BuilderSettings,
    pub assets: AssetSelection,
    pub output: OutputSettings,

    /// Queue capacity handed to each new subscriber
    pub subscriber_capacity: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            image: ImageLabels::default(),
            builder: BuilderSettings::default(),
            assets: AssetSelection::default(),
            output: OutputSettings::default(),
            subscriber_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl BuildConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a TOML config file; missing sections fall back to defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Defaults, then the optional file, then environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.with_env_overrides()
    }

    /// Apply `LIVEBUILDER_*` environment overrides
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Ok(template) = env::var("LIVEBUILDER_TEMPLATE") {
            self.builder.configure_template_file = Some(PathBuf::from(template));
        }

        if let Ok(dir) = env::var("LIVEBUILDER_OUTPUT_DIR") {
            self.output.artifact_dir = PathBuf::from(dir);
        }

        if let Ok(program) = env::var("LIVEBUILDER_BUILDER") {
            self.builder.program = program;
        }

        if let Ok(timeout) = env::var("LIVEBUILDER_PROCESS_TIMEOUT") {
            let secs = timeout
                .parse::<u64>()
                .map_err(|e| ConfigError::ParseError {
                    field: "LIVEBUILDER_PROCESS_TIMEOUT".to_string(),
                    error: e.to_string(),
                })?;
            self.builder.process_timeout_secs = Some(secs);
        }

        Ok(self)
    }

    /// Checks capacities, builder settings and that every selected asset exists
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.subscriber_capacity == 0 {
            return Err(ConfigError::ValidationFailed(
                "Subscriber capacity must be at least 1".to_string(),
            ));
        }
        if self.builder.output_capacity == 0 {
            return Err(ConfigError::ValidationFailed(
                "Output capacity must be at least 1".to_string(),
            ));
        }
        if self.builder.program.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "Builder program cannot be empty".to_string(),
            ));
        }
        if self.builder.build_verb.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "Build verb cannot be empty".to_string(),
            ));
        }
        if self.builder.process_timeout_secs == Some(0) {
            return Err(ConfigError::ValidationFailed(
                "Process timeout must be at least 1 second".to_string(),
            ));
        }
        if self.output.artifact_extension.trim_start_matches('.').is_empty() {
            return Err(ConfigError::ValidationFailed(
                "Artifact extension cannot be empty".to_string(),
            ));
        }
        for (name, value) in self.image.fields() {
            if normalize_label(value).is_empty() {
                return Err(ConfigError::ValidationFailed(format!(
                    "Image label '{}' cannot be empty",
                    name
                )));
            }
        }

        if let Some(template) = &self.builder.configure_template_file {
            if !template.is_file() {
                return Err(ConfigError::MissingAsset(template.clone()));
            }
        }

        if let Some(missing) = self.assets.all().find(|p| !p.is_file()) {
            return Err(ConfigError::MissingAsset(missing.clone()));
        }

        Ok(())
    }

    pub fn with_labels(mut self, labels: ImageLabels) -> Self {
        self.image = labels;
        self
    }

    pub fn with_configure_template(mut self, template: impl Into<String>) -> Self {
        self.builder.configure_template = Some(template.into());
        self
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.builder.program = program.into();
        self
    }

    pub fn with_process_timeout(mut self, timeout: Duration) -> Self {
        self.builder.process_timeout_secs = Some(timeout.as_secs());
        self
    }

    pub fn with_custom_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.assets.custom_files.push(path.into());
        self
    }

    pub fn with_package_list(mut self, path: impl Into<PathBuf>) -> Self {
        self.assets.package_lists.push(path.into());
        self
    }

    pub fn with_splash_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.assets.splash_images.push(path.into());
        self
    }

    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output.artifact_dir = dir.into();
        self
    }

    pub fn with_subscriber_capacity(mut self, capacity: usize) -> Self {
        self.subscriber_capacity = capacity;
        self
    }
}
