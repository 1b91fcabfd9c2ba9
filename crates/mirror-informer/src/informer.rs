//! The shared index informer.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use mirror_cache::{Indexer, IndexedStore, Indexers, Store};
use mirror_core::{
    deletion_handling_key_func, Clock, KeyFunc, MirrorError, RealClock, ResourceVersion, Result,
};

use crate::delta::{DeltaKind, Deltas};
use crate::handler::{Notification, ResourceEventHandler};
use crate::listener::{ProcessorListener, INITIAL_BUFFER_SIZE};
use crate::processor::SharedProcessor;
use crate::resync::{determine_resync_period, MINIMUM_RESYNC_PERIOD};
use crate::shutdown::{ShutdownController, ShutdownSignal};
use crate::source::{DeltaSource, SourceConfig};

/// Eventually consistent link between in-process listeners and the
/// authoritative state of a remote object collection.
///
/// The informer maintains a local indexed replica of the collection and
/// delivers per-object change notifications to every registered handler.
/// For a given informer and handler, all notifications are delivered
/// sequentially, and per object key they are delivered in the order the
/// deltas were applied. Notifications happen after the corresponding cache
/// and index updates. There is no ordering coordination between different
/// handlers.
///
/// A delete notification exposes the last locally known state of the
/// object; its resource version is the one the source reported for the
/// absent state, never a stale present version.
///
/// Construct with [`builder`](SharedIndexInformer::builder), register
/// handlers, then drive with [`run`](SharedIndexInformer::run).
pub struct SharedIndexInformer {
    indexer: Arc<IndexedStore>,
    processor: Arc<SharedProcessor>,
    source: Arc<dyn DeltaSource>,
    clock: Arc<dyn Clock>,
    /// Resync period used by `add_event_handler`.
    default_resync_period: Duration,
    initial_buffer_size: usize,
    state: Mutex<LifecycleState>,
    /// Halts delta distribution so a late handler can join atomically.
    block_deltas: AsyncMutex<()>,
}

impl std::fmt::Debug for SharedIndexInformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedIndexInformer").finish_non_exhaustive()
    }
}

struct LifecycleState {
    started: bool,
    stopped: bool,
    /// How often the source's resync timer fires so `should_resync` can be
    /// checked. Lowered (before start only) when a handler requests a
    /// smaller period.
    resync_check_period: Duration,
}

impl SharedIndexInformer {
    /// Start building an informer.
    pub fn builder() -> SharedIndexInformerBuilder {
        SharedIndexInformerBuilder::default()
    }

    /// Register a handler using the informer's default resync period.
    pub async fn add_event_handler(&self, handler: Arc<dyn ResourceEventHandler>) {
        self.add_event_handler_with_resync_period(handler, self.default_resync_period)
            .await;
    }

    /// Register a handler with its own resync period.
    ///
    /// The period is coerced: requests below one second are raised to one
    /// second, and requests below the informer's resync check period are
    /// raised to it once the informer has started (before start they lower
    /// the check period instead, re-coercing every existing handler).
    ///
    /// Registering after the informer has started blocks delta processing
    /// briefly while the handler receives one synthetic add notification
    /// per object currently in the cache, then joins the live stream with
    /// no gap and no duplicates. Registering after stop is a no-op.
    pub async fn add_event_handler_with_resync_period(
        &self,
        handler: Arc<dyn ResourceEventHandler>,
        resync_period: Duration,
    ) {
        let listener = {
            let mut state = self.state.lock().expect("informer state lock poisoned");
            if state.stopped {
                warn!("handler was not added because the informer has already stopped");
                return;
            }

            let mut resync_period = resync_period;
            if !resync_period.is_zero() {
                if resync_period < MINIMUM_RESYNC_PERIOD {
                    warn!(
                        requested = ?resync_period,
                        minimum = ?MINIMUM_RESYNC_PERIOD,
                        "requested resync period is too small; raising to the minimum"
                    );
                    resync_period = MINIMUM_RESYNC_PERIOD;
                }
                if resync_period < state.resync_check_period {
                    if state.started {
                        warn!(
                            requested = ?resync_period,
                            check_period = ?state.resync_check_period,
                            "informer already started; raising requested resync period to the check period"
                        );
                        resync_period = state.resync_check_period;
                    } else {
                        state.resync_check_period = resync_period;
                        self.processor.resync_check_period_changed(resync_period);
                    }
                }
            }

            let listener = ProcessorListener::new(
                handler,
                resync_period,
                determine_resync_period(resync_period, state.resync_check_period),
                self.clock.now(),
                self.initial_buffer_size,
            );

            if !state.started {
                self.processor.add_listener(listener);
                return;
            }
            listener
        };

        // Late join. To observe a consistent prefix the handler must not
        // race live deltas: stop delta distribution, register, replay the
        // current cache contents to this listener only, resume.
        let _block = self.block_deltas.lock().await;
        self.processor.add_listener(Arc::clone(&listener));
        for obj in self.indexer.list() {
            listener.add(Notification::Add { new: obj }).await;
        }
        debug!("late-joining handler registered and replayed");
    }

    /// The informer's local cache.
    pub fn get_store(&self) -> Arc<dyn Store> {
        Arc::clone(&self.indexer) as Arc<dyn Store>
    }

    /// The informer's local cache, with index lookups.
    pub fn get_indexer(&self) -> Arc<dyn Indexer> {
        Arc::clone(&self.indexer) as Arc<dyn Indexer>
    }

    /// Register additional indexers. Fails once the informer has started.
    pub fn add_indexers(&self, indexers: Indexers) -> Result<()> {
        let state = self.state.lock().expect("informer state lock poisoned");
        if state.started {
            return Err(MirrorError::AlreadyStarted);
        }
        self.indexer.add_indexers(indexers)
    }

    /// Whether the initial full LIST has been applied to the local cache.
    /// Unrelated to resync.
    pub fn has_synced(&self) -> bool {
        let state = self.state.lock().expect("informer state lock poisoned");
        if !state.started {
            return false;
        }
        self.source.has_synced()
    }

    /// Resource version observed when last synced with the authoritative
    /// store. Empty before the informer starts.
    pub fn last_sync_resource_version(&self) -> ResourceVersion {
        let state = self.state.lock().expect("informer state lock poisoned");
        if !state.started {
            return ResourceVersion::empty();
        }
        self.source.last_sync_resource_version()
    }

    /// Run the informer until `stop` fires, then shut down the processor
    /// and return.
    ///
    /// The processor is stopped strictly after the source so deltas already
    /// accepted still fan out; every listener task is joined before this
    /// returns.
    pub async fn run(self: Arc<Self>, stop: ShutdownSignal) {
        let resync_check_period = {
            let mut state = self.state.lock().expect("informer state lock poisoned");
            if state.started {
                warn!("informer run called more than once; ignoring");
                return;
            }
            state.started = true;
            state.resync_check_period
        };

        let processor_stop = ShutdownController::new();
        let processor_task = {
            let processor = Arc::clone(&self.processor);
            let signal = processor_stop.signal();
            tokio::spawn(async move { processor.run(signal).await })
        };

        let config = SourceConfig {
            process: {
                let informer = Arc::clone(&self);
                Arc::new(move |deltas: Deltas| {
                    let informer = Arc::clone(&informer);
                    Box::pin(async move { informer.handle_deltas(deltas).await })
                        as BoxFuture<'static, Result<()>>
                })
            },
            should_resync: {
                let processor = Arc::clone(&self.processor);
                Arc::new(move || processor.should_resync())
            },
            resync_check_period,
        };

        info!("informer started");
        self.source.run(config, stop).await;

        {
            let mut state = self.state.lock().expect("informer state lock poisoned");
            state.stopped = true;
        }
        processor_stop.trigger();
        if let Err(err) = processor_task.await {
            warn!(error = %err, "processor task ended abnormally");
        }
        info!("informer stopped");
    }

    /// Apply one ordered delta batch: mutate the indexed cache, then publish
    /// one notification per delta.
    ///
    /// Holds the delta-blocking mutex for the whole batch so cache mutation
    /// and notification emission appear atomic to late-joining handlers. A
    /// store failure propagates to the source, which must not advance past
    /// the batch; the notification for a failed mutation is never published.
    pub async fn handle_deltas(&self, deltas: Deltas) -> Result<()> {
        let _block = self.block_deltas.lock().await;
        for delta in deltas {
            match delta.kind {
                DeltaKind::Sync | DeltaKind::Added | DeltaKind::Updated => {
                    let is_sync = delta.kind == DeltaKind::Sync;
                    if let Some(old) = self.indexer.get(&delta.object)? {
                        self.indexer.update(Arc::clone(&delta.object))?;
                        self.processor
                            .distribute(
                                Notification::Update {
                                    old,
                                    new: delta.object,
                                },
                                is_sync,
                            )
                            .await;
                    } else {
                        self.indexer.add(Arc::clone(&delta.object))?;
                        self.processor
                            .distribute(Notification::Add { new: delta.object }, is_sync)
                            .await;
                    }
                }
                DeltaKind::Deleted => {
                    self.indexer.delete(&delta.object)?;
                    self.processor
                        .distribute(Notification::Delete { old: delta.object }, false)
                        .await;
                }
            }
        }
        Ok(())
    }
}

/// Builder for [`SharedIndexInformer`].
pub struct SharedIndexInformerBuilder {
    source: Option<Arc<dyn DeltaSource>>,
    key_func: Option<KeyFunc>,
    indexers: Indexers,
    resync_period: Duration,
    clock: Option<Arc<dyn Clock>>,
    initial_buffer_size: usize,
}

impl Default for SharedIndexInformerBuilder {
    fn default() -> Self {
        Self {
            source: None,
            key_func: None,
            indexers: Indexers::new(),
            resync_period: Duration::ZERO,
            clock: None,
            initial_buffer_size: INITIAL_BUFFER_SIZE,
        }
    }
}

impl SharedIndexInformerBuilder {
    /// Set the delta source. Required.
    #[must_use]
    pub fn source(mut self, source: Arc<dyn DeltaSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the key function. Defaults to the tombstone-aware
    /// `namespace/name` function.
    #[must_use]
    pub fn key_func(mut self, key_func: KeyFunc) -> Self {
        self.key_func = Some(key_func);
        self
    }

    /// Set the initial indexers.
    #[must_use]
    pub fn indexers(mut self, indexers: Indexers) -> Self {
        self.indexers = indexers;
        self
    }

    /// Set the default handler resync period and initial resync check
    /// period. Zero (the default) disables resync.
    #[must_use]
    pub fn resync_period(mut self, period: Duration) -> Self {
        self.resync_period = period;
        self
    }

    /// Override the clock. Defaults to [`RealClock`].
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Override the initial per-listener notification buffer capacity.
    #[must_use]
    pub fn initial_buffer_size(mut self, size: usize) -> Self {
        self.initial_buffer_size = size;
        self
    }

    /// Build the informer.
    pub fn build(self) -> Result<Arc<SharedIndexInformer>> {
        let source = self.source.ok_or_else(|| {
            MirrorError::Configuration("a delta source is required".to_string())
        })?;
        let key_func = self
            .key_func
            .unwrap_or_else(|| Arc::new(deletion_handling_key_func));
        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(RealClock));

        Ok(Arc::new(SharedIndexInformer {
            indexer: Arc::new(IndexedStore::new(key_func, self.indexers)),
            processor: Arc::new(SharedProcessor::new(Arc::clone(&clock))),
            source,
            clock,
            default_resync_period: self.resync_period,
            initial_buffer_size: self.initial_buffer_size,
            state: Mutex::new(LifecycleState {
                started: false,
                stopped: false,
                resync_check_period: self.resync_period,
            }),
            block_deltas: AsyncMutex::new(()),
        }))
    }
}
