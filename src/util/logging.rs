//! Structured logging setup for the livebuilder binary
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the binary, which calls one of the `init_*` functions here once at
//! startup. Logs always go to stderr so stdout stays free for progress
//! output.
//!
//! # Environment Variables
//!
//! - `LIVEBUILDER_LOG_LEVEL` - trace, debug, info, warn or error (default info)
//! - `LIVEBUILDER_LOG_JSON` - `true` for JSON lines
//! - `RUST_LOG` - standard filter directives, applied on top
//!
//! # Example
//!
//! ```no_run
//! use livebuilder::util::logging;
//!
//! logging::init_from_env();
//! tracing::info!(stage = "configure", "Stage started");
//! ```

use std::env;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Configuration for logging initialization
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum level for `livebuilder` events
    pub level: Level,

    /// Emit JSON lines instead of human-readable text
    pub use_json: bool,

    /// Include the module target (e.g. livebuilder::pipeline) in logs
    pub include_target: bool,

    /// Include file and line number information
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            use_json: false,
            include_target: false,
            include_location: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// Read `LIVEBUILDER_LOG_LEVEL` and `LIVEBUILDER_LOG_JSON`
    pub fn from_env() -> Self {
        let level = env::var("LIVEBUILDER_LOG_LEVEL")
            .map(|l| parse_level(&l))
            .unwrap_or(Level::INFO);

        let use_json = env::var("LIVEBUILDER_LOG_JSON")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(false);

        Self {
            level,
            use_json,
            ..Default::default()
        }
    }

    /// Verbose output with source locations, for debugging the engine
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            use_json: false,
            include_target: true,
            include_location: true,
        }
    }
}

/// Parses a log level, falling back to INFO with a warning on stderr
pub fn parse_level(level_str: &str) -> Level {
    match level_str.trim().to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!(
                "Invalid log level '{}', defaulting to INFO. Valid levels: trace, debug, info, warn, error",
                level_str
            );
            Level::INFO
        }
    }
}

fn build_filter(level: Level) -> EnvFilter {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = format!("livebuilder={}", level).parse() {
        filter = filter.add_directive(directive);
    }
    filter
}

/// Install the global subscriber; later calls are no-ops
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = build_filter(config.level);

        if config.use_json {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_target(config.include_target)
                        .with_file(config.include_location)
                        .with_line_number(config.include_location)
                        .with_current_span(true),
                )
                .init();
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(config.include_target)
                        .with_file(config.include_location)
                        .with_line_number(config.include_location),
                )
                .init();
        }
    });
}

pub fn init_default() {
    init_logging(LoggingConfig::default());
}

pub fn init_from_env() {
    init_logging(LoggingConfig::from_env());
}
