//! Logging-based progress handler

use super::{EventKind, ProgressEvent, ProgressHandler};
use tracing::{debug, info};

/// Handler that logs progress events using tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ProgressHandler for LoggingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        let message = event.message().trim_end();
        match event.kind() {
            EventKind::Start => info!(stage = %message, "Stage started"),
            EventKind::Update => debug!("{}", message),
            EventKind::End => info!(summary = %message, "Pipeline finished"),
        }
    }
}
