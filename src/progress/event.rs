//! Progress events published by the pipeline

use serde::Serialize;
use std::fmt;

/// Position of an event within a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Start,
    Update,
    End,
}

/// How a subscriber should combine the message with text it already holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
    /// Discard text accumulated for the current stage
    Replace,
    /// Add to the accumulated text
    Append,
}

/// One unit of progress information. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    kind: EventKind,
    message: String,
    mode: UpdateMode,
}

impl ProgressEvent {
    pub fn new(kind: EventKind, message: impl Into<String>, mode: UpdateMode) -> Self {
        Self {
            kind,
            message: message.into(),
            mode,
        }
    }

    /// Stage entry; subscribers reset their per-stage text
    pub fn start(message: impl Into<String>) -> Self {
        Self::new(EventKind::Start, message, UpdateMode::Replace)
    }

    pub fn update(message: impl Into<String>) -> Self {
        Self::new(EventKind::Update, message, UpdateMode::Append)
    }

    /// Final pipeline event
    pub fn end(message: impl Into<String>) -> Self {
        Self::new(EventKind::End, message, UpdateMode::Append)
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn mode(&self) -> UpdateMode {
        self.mode
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        let start = ProgressEvent::start("Configuring");
        assert_eq!(start.kind(), EventKind::Start);
        assert_eq!(start.mode(), UpdateMode::Replace);
        assert_eq!(start.message(), "Configuring");

        let update = ProgressEvent::update("line");
        assert_eq!(update.kind(), EventKind::Update);
        assert_eq!(update.mode(), UpdateMode::Append);

        let end = ProgressEvent::end("done");
        assert_eq!(end.kind(), EventKind::End);
        assert_eq!(end.mode(), UpdateMode::Append);
    }

    #[test]
    fn test_serializes_lowercase() {
        let json = serde_json::to_string(&ProgressEvent::start("Importing")).unwrap();
        assert_eq!(
            json,
            r#"{"kind":"start","message":"Importing","mode":"replace"}"#
        );
    }
}
