//! Publish/subscribe fan-out of progress events
//!
//! Every subscriber owns a bounded queue. Publishing uses a non-blocking send:
//! when a queue is full the event is dropped for that subscriber only, so a
//! slow or abandoned consumer can never stall the pipeline. Delivery is lossy
//! on purpose; this feeds progress displays, not a durable log.

use super::event::ProgressEvent;
use std::sync::{PoisonError, RwLock};
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tracing::trace;

/// Default number of pending events per subscriber
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 100;

pub struct EventBus {
    subscribers: RwLock<Vec<mpsc::Sender<ProgressEvent>>>,
    capacity: usize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SUBSCRIBER_CAPACITY)
    }

    /// Bus whose subscribers get `capacity` pending slots each
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        self.subscribe_with_capacity(self.capacity)
    }

    pub fn subscribe_with_capacity(&self, capacity: usize) -> Subscription {
        let (sender, receiver) = mpsc::channel(capacity.max(1));

        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        // Consumers that dropped their receiver are pruned here
        subscribers.retain(|s| !s.is_closed());
        subscribers.push(sender);

        Subscription { receiver }
    }

    /// Fan `event` out to every subscriber without blocking.
    ///
    /// Returns how many subscribers accepted it.
    pub fn publish(&self, event: ProgressEvent) -> usize {
        let subscribers = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let mut delivered = 0;
        for subscriber in subscribers.iter() {
            match subscriber.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    trace!(message = %event.message(), "Subscriber queue full, dropping event");
                }
                Err(TrySendError::Closed(_)) => {}
            }
        }
        delivered
    }

    /// Subscribers whose receiver is still alive
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| !s.is_closed())
            .count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving end of one subscriber's queue
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::Receiver<ProgressEvent>,
}

impl Subscription {
    /// Wait for the next event; `None` once the bus is gone and the queue drained
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.receiver.recv().await
    }

    /// Next queued event, if any, without waiting
    pub fn try_recv(&mut self) -> Option<ProgressEvent> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Everything currently queued
    pub fn drain(&mut self) -> Vec<ProgressEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(n: usize) -> ProgressEvent {
        ProgressEvent::update(format!("event {}", n))
    }

    #[test]
    fn test_full_queue_keeps_first_events_in_order() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe_with_capacity(5);

        for i in 0..12 {
            bus.publish(numbered(i));
        }

        let received: Vec<String> = sub.drain().iter().map(|e| e.message().to_string()).collect();
        assert_eq!(
            received,
            vec!["event 0", "event 1", "event 2", "event 3", "event 4"]
        );
    }

    #[test]
    fn test_slow_subscriber_does_not_affect_others() {
        let bus = EventBus::new();
        let mut slow = bus.subscribe_with_capacity(1);
        let mut fast = bus.subscribe_with_capacity(10);

        for i in 0..3 {
            bus.publish(numbered(i));
        }

        assert_eq!(slow.drain().len(), 1);
        assert_eq!(fast.drain().len(), 3);
    }

    #[test]
    fn test_publish_reports_delivery_count() {
        let bus = EventBus::new();
        let _a = bus.subscribe_with_capacity(1);
        let _b = bus.subscribe_with_capacity(2);

        assert_eq!(bus.publish(numbered(0)), 2);
        assert_eq!(bus.publish(numbered(1)), 1);
        assert_eq!(bus.publish(numbered(2)), 0);
    }

    #[test]
    fn test_late_subscriber_gets_no_replay() {
        let bus = EventBus::new();
        let mut first = bus.subscribe();
        for i in 0..3 {
            bus.publish(numbered(i));
        }

        let mut second = bus.subscribe();
        bus.publish(numbered(3));

        assert_eq!(first.drain().len(), 4);
        let late = second.drain();
        assert_eq!(late.len(), 1);
        assert_eq!(late[0].message(), "event 3");
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::default();
        assert_eq!(bus.publish(numbered(0)), 0);
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let bus = EventBus::new();
        let keep = bus.subscribe();
        let gone = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        drop(gone);
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(bus.publish(numbered(0)), 1);

        let _again = bus.subscribe();
        assert_eq!(bus.subscribers.read().unwrap().len(), 2);
        drop(keep);
    }

    #[tokio::test]
    async fn test_recv_ends_when_bus_dropped() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();
        bus.publish(numbered(0));
        drop(bus);

        assert_eq!(sub.recv().await.map(|e| e.message().to_string()), Some("event 0".to_string()));
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_publishers_preserve_per_task_order() {
        use std::sync::Arc;

        let bus = Arc::new(EventBus::new());
        let mut sub = bus.subscribe_with_capacity(1000);

        let handles: Vec<_> = (0..4)
            .map(|task| {
                let bus = Arc::clone(&bus);
                tokio::spawn(async move {
                    for i in 0..50 {
                        bus.publish(ProgressEvent::update(format!("{}:{}", task, i)));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let events = sub.drain();
        assert_eq!(events.len(), 200);
        for task in 0..4 {
            let seen: Vec<usize> = events
                .iter()
                .filter_map(|e| {
                    let (t, i) = e.message().split_once(':')?;
                    (t.parse::<usize>().ok()? == task).then(|| i.parse().unwrap())
                })
                .collect();
            assert_eq!(seen, (0..50).collect::<Vec<_>>());
        }
    }
}
