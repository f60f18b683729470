//! Console rendering of progress events
//!
//! The console is just another bus subscriber. Human output uses an
//! `indicatif` spinner when stdout is a terminal and plain lines otherwise;
//! JSON output writes one serialized event per line.

use crate::progress::{EventKind, ProgressEvent, ProgressHandler};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Output format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text
    Human,
    /// One JSON object per line (machine-readable)
    Json,
}

/// Prints progress events to stdout
pub struct ConsoleHandler {
    format: OutputFormat,
    spinner: Option<ProgressBar>,
}

impl ConsoleHandler {
    pub fn new(format: OutputFormat) -> Self {
        let interactive = atty::is(atty::Stream::Stdout);
        Self::with_terminal(format, interactive)
    }

    /// Handler with explicit terminal detection, for non-tty callers and tests
    pub fn with_terminal(format: OutputFormat, interactive: bool) -> Self {
        let spinner = (format == OutputFormat::Human && interactive).then(create_spinner);
        Self { format, spinner }
    }

    /// Text this handler prints for `event`, if any
    pub fn render(&self, event: &ProgressEvent) -> Option<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string(event).ok(),
            OutputFormat::Human => {
                let text = event.message().trim_end();
                match event.kind() {
                    EventKind::Start => Some(format!("==> {}", text)),
                    EventKind::Update if text.is_empty() => None,
                    EventKind::Update => Some(format!("    {}", text)),
                    EventKind::End => Some(text.to_string()),
                }
            }
        }
    }
}

impl ProgressHandler for ConsoleHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        let Some(line) = self.render(event) else {
            return;
        };

        match &self.spinner {
            Some(spinner) => match event.kind() {
                EventKind::Start => {
                    spinner.set_message(event.message().trim_end().to_string());
                    spinner.println(line);
                }
                EventKind::Update => spinner.println(line),
                EventKind::End => {
                    spinner.finish_and_clear();
                    println!("{}", line);
                }
            },
            None => println!("{}", line),
        }
    }
}

fn create_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {wide_msg}") {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Shell-style rendering of an argv, quoting tokens that need it
pub fn format_argv(argv: &[String]) -> String {
    argv.iter()
        .map(|arg| {
            if !arg.is_empty() && !arg.chars().any(|c| c.is_whitespace() || c == '\'' || c == '"') {
                arg.clone()
            } else if arg.contains('\'') {
                format!("\"{}\"", arg)
            } else {
                format!("'{}'", arg)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
