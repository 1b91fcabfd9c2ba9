//! Per-listener dispatch pipeline.
//!
//! A listener decouples the shared delta-handling loop from one potentially
//! slow handler. The producer must never wait on a handler: all listeners
//! share a single publication point, so one stalled handler would stall the
//! whole informer. The pipeline is therefore a two-channel pump:
//!
//! ```text
//! distribute → add_tx ══▶ pop task (pending VecDeque) ══▶ next_tx ══▶ run task → handler
//! ```
//!
//! Both channels have capacity 1. The `pop` task always keeps its receive
//! arm enabled, so `add` completes in constant effective time regardless of
//! handler progress; excess notifications accumulate in the pending buffer.
//! The buffer is strictly FIFO and at most one notification lives outside it
//! ("current"), so per-listener order is preserved end to end.
//!
//! The pending buffer grows without bound. A stalled handler therefore grows
//! memory monotonically; that is the accepted trade-off for never blocking
//! the producer, and the pump logs a warning each time the backlog doubles.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::handler::{Notification, ResourceEventHandler};

/// Initial capacity of the pending notification buffer.
pub(crate) const INITIAL_BUFFER_SIZE: usize = 1024;

/// First backoff delay after a handler panic.
const HANDLER_BACKOFF_BASE: Duration = Duration::from_millis(10);

/// Ceiling for the panic backoff.
const HANDLER_BACKOFF_CAP: Duration = Duration::from_secs(1);

/// One registered handler plus its dispatch pipeline.
pub(crate) struct ProcessorListener {
    /// Input side of the pump. Taken on shutdown, which closes the channel
    /// and lets the pump drain out.
    add_tx: Mutex<Option<mpsc::Sender<Notification>>>,
    /// Pump internals, handed to the tasks on start.
    pump: Mutex<Option<PumpParts>>,
    /// Destination of dispatched notifications.
    handler: Arc<dyn ResourceEventHandler>,
    /// Resync period as requested at registration, before coercion.
    requested_resync_period: Duration,
    /// Coerced resync period and next deadline.
    resync: Mutex<ResyncState>,
}

struct PumpParts {
    add_rx: mpsc::Receiver<Notification>,
    next_tx: mpsc::Sender<Notification>,
    next_rx: mpsc::Receiver<Notification>,
    pending: VecDeque<Notification>,
    watermark: usize,
}

struct ResyncState {
    period: Duration,
    next: Instant,
}

impl ProcessorListener {
    pub(crate) fn new(
        handler: Arc<dyn ResourceEventHandler>,
        requested_resync_period: Duration,
        resync_period: Duration,
        now: Instant,
        buffer_size: usize,
    ) -> Arc<Self> {
        let (add_tx, add_rx) = mpsc::channel(1);
        let (next_tx, next_rx) = mpsc::channel(1);
        Arc::new(Self {
            add_tx: Mutex::new(Some(add_tx)),
            pump: Mutex::new(Some(PumpParts {
                add_rx,
                next_tx,
                next_rx,
                pending: VecDeque::with_capacity(buffer_size),
                watermark: buffer_size.max(1),
            })),
            handler,
            requested_resync_period,
            resync: Mutex::new(ResyncState {
                period: resync_period,
                next: now + resync_period,
            }),
        })
    }

    /// Hand a notification to the pump. Effectively non-blocking: the pump
    /// is always ready to receive. A closed pipeline (shutdown) drops the
    /// notification.
    pub(crate) async fn add(&self, notification: Notification) {
        let tx = self
            .add_tx
            .lock()
            .expect("listener input lock poisoned")
            .clone();
        let Some(tx) = tx else {
            debug!("listener already closed; dropping notification");
            return;
        };
        if tx.send(notification).await.is_err() {
            debug!("listener pump gone; dropping notification");
        }
    }

    /// Close the input channel, telling the pump to stop. The pump closes
    /// the dispatch channel in turn.
    pub(crate) fn close(&self) {
        self.add_tx
            .lock()
            .expect("listener input lock poisoned")
            .take();
    }

    /// Spawn the pump and dispatch tasks onto `tasks`. Idempotent.
    pub(crate) fn start(&self, tasks: &mut JoinSet<()>) {
        let parts = self.pump.lock().expect("listener pump lock poisoned").take();
        let Some(parts) = parts else {
            return;
        };
        let handler = Arc::clone(&self.handler);
        tasks.spawn(Self::pop(
            parts.add_rx,
            parts.next_tx,
            parts.pending,
            parts.watermark,
        ));
        tasks.spawn(Self::run(parts.next_rx, handler));
    }

    /// The pump: absorbs arrivals into the pending buffer and forwards one
    /// notification at a time to the dispatch task.
    ///
    /// The forward arm is enabled only while a current notification exists;
    /// the receive arm is always enabled. Exits when the input channel
    /// closes, dropping `next_tx` so the dispatch task stops too.
    async fn pop(
        mut add_rx: mpsc::Receiver<Notification>,
        next_tx: mpsc::Sender<Notification>,
        mut pending: VecDeque<Notification>,
        mut watermark: usize,
    ) {
        let mut current: Option<Notification> = None;
        loop {
            tokio::select! {
                permit = next_tx.reserve(), if current.is_some() => {
                    let Ok(permit) = permit else {
                        // Dispatch task gone; nothing left to forward to.
                        return;
                    };
                    if let Some(notification) = current.take() {
                        permit.send(notification);
                    }
                    current = pending.pop_front();
                }
                added = add_rx.recv() => {
                    let Some(notification) = added else {
                        return;
                    };
                    if current.is_none() {
                        current = Some(notification);
                    } else {
                        pending.push_back(notification);
                        if pending.len() >= watermark {
                            warn!(
                                pending = pending.len(),
                                "listener is falling behind; pending notification buffer keeps growing"
                            );
                            watermark *= 2;
                        }
                    }
                }
            }
        }
    }

    /// The dispatch loop: invokes the handler for each forwarded
    /// notification.
    ///
    /// A panicking handler does not kill the listener: the panic is caught
    /// and logged, the offending notification is skipped — it is never
    /// retried — and after an exponential backoff (capped at one second)
    /// delivery continues with the next notification. A successful delivery
    /// resets the backoff.
    async fn run(mut next_rx: mpsc::Receiver<Notification>, handler: Arc<dyn ResourceEventHandler>) {
        let mut backoff = HANDLER_BACKOFF_BASE;
        while let Some(notification) = next_rx.recv().await {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                dispatch(handler.as_ref(), notification);
            }));
            match outcome {
                Ok(()) => backoff = HANDLER_BACKOFF_BASE,
                Err(payload) => {
                    warn!(
                        panic = panic_message(payload.as_ref()),
                        "event handler panicked; skipping notification"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(HANDLER_BACKOFF_CAP);
                }
            }
        }
    }

    /// Whether this listener is due for a resync at `now`. Always false for
    /// a zero period.
    pub(crate) fn should_resync(&self, now: Instant) -> bool {
        let resync = self.resync.lock().expect("listener resync lock poisoned");
        !resync.period.is_zero() && now >= resync.next
    }

    /// Advance the resync deadline from `now`.
    pub(crate) fn determine_next_resync(&self, now: Instant) {
        let mut resync = self.resync.lock().expect("listener resync lock poisoned");
        resync.next = now + resync.period;
    }

    /// Replace the coerced resync period. The current deadline is kept; the
    /// new period takes effect when the deadline is next advanced.
    pub(crate) fn set_resync_period(&self, period: Duration) {
        let mut resync = self.resync.lock().expect("listener resync lock poisoned");
        resync.period = period;
    }

    pub(crate) fn requested_resync_period(&self) -> Duration {
        self.requested_resync_period
    }
}

fn dispatch(handler: &dyn ResourceEventHandler, notification: Notification) {
    match notification {
        Notification::Add { new } => handler.on_add(new),
        Notification::Update { old, new } => handler.on_update(old, new),
        Notification::Delete { old } => handler.on_delete(old),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
