//! Listener pipeline integration tests: stalled-listener isolation and
//! handler panic recovery, driven through a full informer.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use mirrorcache::prelude::*;

use crate::support::{object, Harness, RecordingHandler};

/// Handler that blocks inside its very first notification until released.
struct StallFirst {
    release: Mutex<Option<std::sync::mpsc::Receiver<()>>>,
    delivered: AtomicUsize,
}

impl StallFirst {
    fn new() -> (Arc<Self>, std::sync::mpsc::Sender<()>) {
        let (tx, rx) = std::sync::mpsc::channel();
        (
            Arc::new(Self {
                release: Mutex::new(Some(rx)),
                delivered: AtomicUsize::new(0),
            }),
            tx,
        )
    }

    fn delivered(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }

    fn record(&self) {
        if self.delivered.fetch_add(1, Ordering::SeqCst) == 0 {
            let gate = self.release.lock().expect("release lock").take();
            if let Some(gate) = gate {
                let _ = gate.recv();
            }
        }
    }
}

impl ResourceEventHandler for StallFirst {
    fn on_add(&self, _obj: BoxObject) {
        self.record();
    }

    fn on_update(&self, _old: BoxObject, _new: BoxObject) {
        self.record();
    }

    fn on_delete(&self, _obj: BoxObject) {
        self.record();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stalled_listener_does_not_block_peers() {
    let harness = Harness::start(SharedIndexInformer::builder()).await;

    let (stalled, release) = StallFirst::new();
    let fast = RecordingHandler::new();
    harness
        .informer
        .add_event_handler(Arc::clone(&stalled) as Arc<dyn ResourceEventHandler>)
        .await;
    harness
        .informer
        .add_event_handler(Arc::clone(&fast) as Arc<dyn ResourceEventHandler>)
        .await;

    const UPDATES: usize = 300;

    // First delta wedges the stalled handler.
    harness
        .source
        .push_and_wait(vec![Delta::new(DeltaKind::Added, object("default", "a", "0"))])
        .await
        .expect("seed");

    // Every subsequent batch must still be accepted and applied: the wedged
    // listener absorbs its copies into its pending buffer.
    for i in 1..=UPDATES {
        harness
            .source
            .push_and_wait(vec![Delta::new(
                DeltaKind::Updated,
                object("default", "a", &i.to_string()),
            )])
            .await
            .expect("producer must not be blocked by the stalled listener");
    }

    // The fast peer got everything while the stalled one is still wedged.
    let events = fast.wait_for(UPDATES + 1).await;
    assert_eq!(events.len(), UPDATES + 1);
    assert_eq!(stalled.delivered(), 1, "stalled handler is still in its first call");

    // After release, the backlog drains completely and in order.
    release.send(()).expect("stalled handler is waiting");
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while stalled.delivered() < UPDATES + 1 {
        assert!(
            tokio::time::Instant::now() < deadline,
            "backlog never drained, delivered {}",
            stalled.delivered()
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    harness.shutdown().await;
}

/// Handler that panics on its fifth invocation and records delivery times.
struct PanicOnFifth {
    calls: AtomicUsize,
    delivered: Mutex<Vec<(String, Instant)>>,
}

impl PanicOnFifth {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delivered: Mutex::new(Vec::new()),
        })
    }

    fn delivered(&self) -> Vec<(String, Instant)> {
        self.delivered.lock().expect("delivered lock").clone()
    }
}

impl ResourceEventHandler for PanicOnFifth {
    fn on_add(&self, obj: BoxObject) {
        if self.calls.fetch_add(1, Ordering::SeqCst) + 1 == 5 {
            panic!("synthetic failure on the fifth notification");
        }
        self.delivered
            .lock()
            .expect("delivered lock")
            .push((obj.name().to_string(), Instant::now()));
    }

    fn on_update(&self, _old: BoxObject, _new: BoxObject) {}
    fn on_delete(&self, _obj: BoxObject) {}
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn handler_panic_skips_notification_and_backs_off() {
    let harness = Harness::start(SharedIndexInformer::builder()).await;

    let handler = PanicOnFifth::new();
    harness
        .informer
        .add_event_handler(Arc::clone(&handler) as Arc<dyn ResourceEventHandler>)
        .await;

    for i in 1..=6 {
        harness
            .source
            .push_and_wait(vec![Delta::new(
                DeltaKind::Added,
                object("default", &format!("obj-{i}"), "1"),
            )])
            .await
            .expect("batch");
    }

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while handler.delivered().len() < 5 {
        assert!(
            tokio::time::Instant::now() < deadline,
            "delivery stopped after the panic: {:?}",
            handler.delivered()
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let delivered = handler.delivered();
    let names: Vec<&str> = delivered.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(
        names,
        vec!["obj-1", "obj-2", "obj-3", "obj-4", "obj-6"],
        "the fifth notification is skipped, never retried"
    );

    // The backoff keeps a gap between the delivery before the panic and the
    // one after it.
    let gap = delivered[4].1 - delivered[3].1;
    assert!(
        gap >= Duration::from_millis(10),
        "expected at least the minimum backoff between obj-4 and obj-6, got {gap:?}"
    );

    harness.shutdown().await;
}
