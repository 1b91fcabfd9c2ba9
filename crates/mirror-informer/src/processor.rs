//! Listener set management and notification fan-out.

use std::sync::{Arc, Mutex, RwLock};

use tokio::task::JoinSet;
use tracing::{debug, warn};

use mirror_core::Clock;

use crate::handler::Notification;
use crate::listener::ProcessorListener;
use crate::resync::determine_resync_period;
use crate::shutdown::ShutdownSignal;

/// Owner of all registered listeners.
///
/// Fans each notification out to every listener (or, for sync-typed
/// notifications, to the listeners currently due for resync) and lifecycles
/// the listener pump tasks.
pub(crate) struct SharedProcessor {
    clock: Arc<dyn Clock>,
    listeners: RwLock<ListenerSet>,
    /// Pump and dispatch tasks of every started listener.
    tasks: Mutex<JoinSet<()>>,
}

#[derive(Default)]
struct ListenerSet {
    /// All registered listeners.
    members: Vec<Arc<ProcessorListener>>,
    /// Subset eligible for sync-typed notifications, recomputed on each
    /// resync tick.
    syncing: Vec<Arc<ProcessorListener>>,
    started: bool,
}

impl SharedProcessor {
    pub(crate) fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            listeners: RwLock::new(ListenerSet::default()),
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// Register a listener. If the processor is already running, its pump
    /// starts immediately. A new listener joins the syncing subset until the
    /// next resync tick recomputes it.
    pub(crate) fn add_listener(&self, listener: Arc<ProcessorListener>) {
        let mut set = self.listeners.write().expect("listeners lock poisoned");
        set.members.push(Arc::clone(&listener));
        set.syncing.push(Arc::clone(&listener));
        if set.started {
            let mut tasks = self.tasks.lock().expect("processor tasks lock poisoned");
            listener.start(&mut tasks);
        }
    }

    /// Fan a notification out. Sync-typed notifications go only to the
    /// syncing subset.
    ///
    /// The listener set is snapshotted under the read lock and the sends
    /// happen after it is released; callers serialize distribution against
    /// registration through the informer's delta-blocking mutex, so the
    /// snapshot cannot miss a concurrently registered listener.
    pub(crate) async fn distribute(&self, notification: Notification, sync: bool) {
        let targets: Vec<Arc<ProcessorListener>> = {
            let set = self.listeners.read().expect("listeners lock poisoned");
            if sync {
                set.syncing.clone()
            } else {
                set.members.clone()
            }
        };
        for listener in targets {
            listener.add(notification.clone()).await;
        }
    }

    /// Recompute the syncing subset: every listener whose deadline has
    /// passed joins it and has its deadline advanced. Returns whether any
    /// listener is due.
    ///
    /// Membership is sampled only here, on the source's resync tick. A
    /// listener that becomes due between ticks does not receive sync-typed
    /// notifications produced in that window.
    pub(crate) fn should_resync(&self) -> bool {
        let mut set = self.listeners.write().expect("listeners lock poisoned");
        let now = self.clock.now();

        let ListenerSet {
            members, syncing, ..
        } = &mut *set;
        syncing.clear();

        let mut resync_needed = false;
        for listener in members.iter() {
            if listener.should_resync(now) {
                resync_needed = true;
                syncing.push(Arc::clone(listener));
                listener.determine_next_resync(now);
            }
        }
        resync_needed
    }

    /// Re-coerce every listener's effective resync period against a new
    /// check period.
    pub(crate) fn resync_check_period_changed(&self, check_period: std::time::Duration) {
        let set = self.listeners.read().expect("listeners lock poisoned");
        for listener in &set.members {
            listener.set_resync_period(determine_resync_period(
                listener.requested_resync_period(),
                check_period,
            ));
        }
    }

    /// Start every listener pump, wait for `stop`, then close every
    /// listener's input channel and join all pump tasks.
    pub(crate) async fn run(&self, stop: ShutdownSignal) {
        {
            let mut set = self.listeners.write().expect("listeners lock poisoned");
            let mut tasks = self.tasks.lock().expect("processor tasks lock poisoned");
            for listener in &set.members {
                listener.start(&mut tasks);
            }
            set.started = true;
        }
        debug!("processor started");

        stop.wait().await;

        let members: Vec<Arc<ProcessorListener>> = {
            let set = self.listeners.read().expect("listeners lock poisoned");
            set.members.clone()
        };
        for listener in &members {
            listener.close();
        }

        let mut tasks = std::mem::take(&mut *self.tasks.lock().expect("processor tasks lock poisoned"));
        while let Some(result) = tasks.join_next().await {
            if let Err(err) = result {
                warn!(error = %err, "listener task ended abnormally");
            }
        }
        debug!("processor stopped");
    }
}
