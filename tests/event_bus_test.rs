//! Event bus fan-out under concurrent producers and slow consumers

use livebuilder::progress::{forward, EventKind, ProgressHandler};
use livebuilder::{EventBus, ProgressEvent};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<ProgressEvent>>,
}

impl ProgressHandler for Recorder {
    fn on_progress(&self, event: &ProgressEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

#[tokio::test]
async fn test_stalled_subscriber_does_not_block_publisher() {
    let bus = EventBus::with_capacity(4);
    let _stalled = bus.subscribe();
    let mut live = bus.subscribe_with_capacity(1_000);

    let publish = async {
        for i in 0..500 {
            bus.publish(ProgressEvent::update(format!("line {}\n", i)));
        }
    };
    tokio::time::timeout(Duration::from_secs(5), publish)
        .await
        .expect("publisher blocked on a full subscriber");

    assert_eq!(live.drain().len(), 500);
}

#[tokio::test]
async fn test_forward_relays_in_order_until_bus_dropped() {
    let bus = Arc::new(EventBus::with_capacity(64));
    let recorder = Arc::new(Recorder::default());
    let relay = forward(bus.subscribe(), recorder.clone());

    bus.publish(ProgressEvent::start("Configuring live-build\n"));
    bus.publish(ProgressEvent::update("P: Creating config tree\n"));
    bus.publish(ProgressEvent::end("Build finished\n"));
    drop(bus);

    let handled = relay.await.unwrap();
    assert_eq!(handled, 3);

    let kinds: Vec<EventKind> = recorder
        .events
        .lock()
        .unwrap()
        .iter()
        .map(|e| e.kind())
        .collect();
    assert_eq!(kinds, vec![EventKind::Start, EventKind::Update, EventKind::End]);
}

#[tokio::test]
async fn test_concurrent_publishers() {
    let bus = Arc::new(EventBus::with_capacity(10_000));
    let mut sub = bus.subscribe();

    let mut tasks = Vec::new();
    for worker in 0..8 {
        let bus = Arc::clone(&bus);
        tasks.push(tokio::spawn(async move {
            for i in 0..100 {
                bus.publish(ProgressEvent::update(format!("{}:{}\n", worker, i)));
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let events = sub.drain();
    assert_eq!(events.len(), 800);

    // Per-publisher order is preserved
    for worker in 0..8 {
        let prefix = format!("{}:", worker);
        let seen: Vec<usize> = events
            .iter()
            .filter_map(|e| e.message().strip_prefix(&prefix))
            .map(|rest| rest.trim_end().parse().unwrap())
            .collect();
        assert_eq!(seen, (0..100).collect::<Vec<_>>());
    }
}
