//! Shared fixtures: a concrete object type, a scripted delta source, and a
//! recording event handler.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use mirrorcache::prelude::*;

/// Route library tracing through the test harness, once. `RUST_LOG`
/// controls verbosity as usual.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Minimal namespaced object for tests.
#[derive(Debug, Clone)]
pub struct TestObject {
    pub namespace: Option<String>,
    pub name: String,
    pub version: ResourceVersion,
    pub labels: BTreeMap<String, String>,
}

impl ObjectMeta for TestObject {
    fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn resource_version(&self) -> &ResourceVersion {
        &self.version
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn object(namespace: &str, name: &str, version: &str) -> BoxObject {
    Arc::new(TestObject {
        namespace: Some(namespace.to_string()),
        name: name.to_string(),
        version: ResourceVersion::new(version),
        labels: BTreeMap::new(),
    })
}

pub fn labeled(namespace: &str, name: &str, version: &str, app: &str) -> BoxObject {
    let mut labels = BTreeMap::new();
    labels.insert("app".to_string(), app.to_string());
    Arc::new(TestObject {
        namespace: Some(namespace.to_string()),
        name: name.to_string(),
        version: ResourceVersion::new(version),
        labels,
    })
}

/// Index function over the `app` label of a [`TestObject`].
pub fn app_label_index_func(obj: &BoxObject) -> Result<Vec<String>, MirrorError> {
    let obj = obj
        .as_any()
        .downcast_ref::<TestObject>()
        .ok_or_else(|| MirrorError::index_func("by-app", "not a TestObject"))?;
    Ok(obj.labels.get("app").cloned().into_iter().collect())
}

enum Command {
    Batch(Deltas, oneshot::Sender<Result<(), MirrorError>>),
    Resync(oneshot::Sender<bool>),
}

/// Scripted delta source. Tests push batches and resync ticks; the source
/// forwards them through the informer-supplied callbacks on its run loop.
///
/// This double applies each batch exactly once and reports the outcome to
/// the pushing test instead of retrying, so error paths stay observable.
pub struct QueueSource {
    tx: mpsc::UnboundedSender<Command>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<Command>>>,
    /// Known objects replayed on resync, normally the informer's own store.
    known: Mutex<Option<Arc<dyn Store>>>,
    synced: AtomicBool,
    last_rv: Mutex<ResourceVersion>,
}

impl QueueSource {
    pub fn new() -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            tx,
            rx: Mutex::new(Some(rx)),
            known: Mutex::new(None),
            synced: AtomicBool::new(false),
            last_rv: Mutex::new(ResourceVersion::empty()),
        })
    }

    /// Set the store consulted for resync replays.
    pub fn set_known_objects(&self, store: Arc<dyn Store>) {
        *self.known.lock().expect("known lock") = Some(store);
    }

    /// Push one delta batch and wait until the informer has applied it (or
    /// refused it).
    pub async fn push_and_wait(&self, deltas: Deltas) -> Result<(), MirrorError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(Command::Batch(deltas, ack_tx))
            .expect("source run loop gone");
        tokio::time::timeout(Duration::from_secs(5), ack_rx)
            .await
            .expect("batch was never processed")
            .expect("source dropped the ack")
    }

    /// Simulate a resync tick. Returns whether any listener was due (and
    /// sync deltas were therefore emitted).
    pub async fn trigger_resync(&self) -> bool {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(Command::Resync(ack_tx))
            .expect("source run loop gone");
        tokio::time::timeout(Duration::from_secs(5), ack_rx)
            .await
            .expect("resync was never processed")
            .expect("source dropped the ack")
    }

    /// Raise the sync high-water mark to the newest version in an applied
    /// batch, as a real list/watch client does.
    fn observe_versions(&self, deltas: &Deltas) {
        let mut last_rv = self.last_rv.lock().expect("rv lock");
        for delta in deltas {
            let version = delta.object.resource_version();
            if version.newer_than(&last_rv) {
                *last_rv = version.clone();
            }
        }
    }
}

#[async_trait]
impl DeltaSource for QueueSource {
    async fn run(&self, config: SourceConfig, stop: ShutdownSignal) {
        let mut rx = self
            .rx
            .lock()
            .expect("source receiver lock")
            .take()
            .expect("source run loop started twice");

        let stopped = stop.wait();
        tokio::pin!(stopped);

        loop {
            tokio::select! {
                _ = &mut stopped => return,
                command = rx.recv() => {
                    let Some(command) = command else { return };
                    match command {
                        Command::Batch(deltas, ack) => {
                            let result = (config.process)(deltas.clone()).await;
                            if result.is_ok() {
                                self.observe_versions(&deltas);
                                self.synced.store(true, Ordering::SeqCst);
                            }
                            let _ = ack.send(result);
                        }
                        Command::Resync(ack) => {
                            let mut emitted = false;
                            if (config.should_resync)() {
                                let known = self.known.lock().expect("known lock").clone();
                                if let Some(store) = known {
                                    for obj in store.list() {
                                        let _ = (config.process)(vec![Delta::new(
                                            DeltaKind::Sync,
                                            obj,
                                        )])
                                        .await;
                                    }
                                }
                                emitted = true;
                            }
                            let _ = ack.send(emitted);
                        }
                    }
                }
            }
        }
    }

    fn has_synced(&self) -> bool {
        self.synced.load(Ordering::SeqCst)
    }

    fn last_sync_resource_version(&self) -> ResourceVersion {
        self.last_rv.lock().expect("rv lock").clone()
    }
}

/// One observed handler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Add {
        key: String,
        version: String,
    },
    Update {
        key: String,
        old_version: String,
        new_version: String,
    },
    Delete {
        key: String,
        version: String,
    },
}

impl Event {
    pub fn key(&self) -> &str {
        match self {
            Event::Add { key, .. } | Event::Update { key, .. } | Event::Delete { key, .. } => key,
        }
    }
}

/// Handler that records every invocation in order.
#[derive(Default)]
pub struct RecordingHandler {
    events: Mutex<Vec<Event>>,
}

impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().expect("events lock").clone()
    }

    /// Wait until at least `n` events were recorded, then return them all.
    pub async fn wait_for(&self, n: usize) -> Vec<Event> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let events = self.events();
            if events.len() >= n {
                return events;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {n} events, saw {events:?}"
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

fn key_of(obj: &BoxObject) -> String {
    deletion_handling_key_func(obj)
        .map(|key| key.to_string())
        .unwrap_or_else(|_| "<unkeyed>".to_string())
}

impl ResourceEventHandler for RecordingHandler {
    fn on_add(&self, obj: BoxObject) {
        self.events.lock().expect("events lock").push(Event::Add {
            key: key_of(&obj),
            version: obj.resource_version().to_string(),
        });
    }

    fn on_update(&self, old: BoxObject, new: BoxObject) {
        self.events.lock().expect("events lock").push(Event::Update {
            key: key_of(&new),
            old_version: old.resource_version().to_string(),
            new_version: new.resource_version().to_string(),
        });
    }

    fn on_delete(&self, obj: BoxObject) {
        self.events.lock().expect("events lock").push(Event::Delete {
            key: key_of(&obj),
            version: obj.resource_version().to_string(),
        });
    }
}

/// Informer + source + running task, wired together for a test.
pub struct Harness {
    pub informer: Arc<SharedIndexInformer>,
    pub source: Arc<QueueSource>,
    pub stop: ShutdownController,
    run: tokio::task::JoinHandle<()>,
}

impl Harness {
    /// Build and start an informer around a fresh [`QueueSource`].
    pub async fn start(builder: SharedIndexInformerBuilder) -> Self {
        init_tracing();
        let source = QueueSource::new();
        let informer = builder
            .source(Arc::clone(&source) as Arc<dyn DeltaSource>)
            .build()
            .expect("informer should build");
        source.set_known_objects(informer.get_store());

        let stop = ShutdownController::new();
        let run = tokio::spawn(Arc::clone(&informer).run(stop.signal()));

        Self {
            informer,
            source,
            stop,
            run,
        }
    }

    /// Trigger stop and wait for the informer (and every listener task) to
    /// finish.
    pub async fn shutdown(self) {
        self.stop.trigger();
        tokio::time::timeout(Duration::from_secs(5), self.run)
            .await
            .expect("informer should stop in bounded time")
            .expect("informer task should not panic");
    }
}
