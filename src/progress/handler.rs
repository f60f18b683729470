//! Progress handler trait and subscription forwarding

use super::bus::Subscription;
use super::event::ProgressEvent;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Trait for consumers of progress events
pub trait ProgressHandler: Send + Sync {
    /// Called for each event received from a subscription
    fn on_progress(&self, event: &ProgressEvent);
}

/// No-op handler that ignores all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHandler;

impl ProgressHandler for NoOpHandler {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

/// Drain `subscription` into `handler` on a background task.
///
/// The task ends once the bus is dropped and the queue is empty, and yields
/// the number of events handled.
pub fn forward(
    mut subscription: Subscription,
    handler: Arc<dyn ProgressHandler>,
) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut handled = 0;
        while let Some(event) = subscription.recv().await {
            handler.on_progress(&event);
            handled += 1;
        }
        handled
    })
}
