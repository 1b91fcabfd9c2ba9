//! Shutdown coordination.
//!
//! The informer uses two stop signals with a strict ordering: the external
//! one stops the delta source, and an internal one then stops the processor,
//! so in-flight deltas are still distributed before listener pumps wind
//! down. Both are driven by this controller/signal pair.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

/// Controller for triggering shutdown.
///
/// Cheap to clone; all clones share one signal.
#[derive(Debug, Clone)]
pub struct ShutdownController {
    inner: Arc<ShutdownInner>,
}

#[derive(Debug)]
struct ShutdownInner {
    /// Whether shutdown has been triggered.
    triggered: AtomicBool,
    /// Sender for the shutdown signal.
    tx: watch::Sender<bool>,
    /// Receiver kept so the channel stays open with no outstanding signals.
    rx: watch::Receiver<bool>,
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownController {
    /// Create a new shutdown controller.
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            inner: Arc::new(ShutdownInner {
                triggered: AtomicBool::new(false),
                tx,
                rx,
            }),
        }
    }

    /// Get a signal that resolves once shutdown is triggered.
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.inner.rx.clone(),
        }
    }

    /// Subscribe to raw shutdown notifications.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.rx.clone()
    }

    /// Check whether shutdown has been triggered.
    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::SeqCst)
    }

    /// Trigger shutdown. Idempotent.
    pub fn trigger(&self) {
        if self
            .inner
            .triggered
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        debug!("shutdown triggered");
        let _ = self.inner.tx.send(true);
    }
}

/// Future-style handle that resolves when shutdown is triggered.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Wait for the shutdown signal.
    pub async fn wait(mut self) {
        loop {
            if *self.rx.borrow() {
                return;
            }
            if self.rx.changed().await.is_err() {
                // Controller dropped, treat as shutdown.
                return;
            }
            if *self.rx.borrow() {
                return;
            }
        }
    }

    /// Check whether shutdown has already been triggered without waiting.
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }
}
