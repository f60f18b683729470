//! Progress reporting for build runs

mod bus;
mod event;
mod handler;
mod logging;

pub use bus::{EventBus, Subscription, DEFAULT_SUBSCRIBER_CAPACITY};
pub use event::{EventKind, ProgressEvent, UpdateMode};
pub use handler::{forward, NoOpHandler, ProgressHandler};
pub use logging::LoggingHandler;
