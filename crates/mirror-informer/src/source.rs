//! The delta source interface.
//!
//! The informer core does not list or watch anything itself. A
//! [`DeltaSource`] owns the connection to the authoritative state (and its
//! retry policy) and pushes delta batches into the informer through the
//! callbacks in [`SourceConfig`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;

use mirror_core::{ResourceVersion, Result};

use crate::delta::Deltas;
use crate::shutdown::ShutdownSignal;

/// Push callback applying one delta batch to the informer.
///
/// An `Err` return means the batch was not applied; the source must retry it
/// and must not advance past it.
pub type ProcessFunc = Arc<dyn Fn(Deltas) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Query asking whether any listener is due for a resync.
///
/// The source calls this on its resync tick; a `true` return means it should
/// emit `Sync` deltas for its known objects.
pub type ShouldResyncFunc = Arc<dyn Fn() -> bool + Send + Sync>;

/// Callbacks and timing the informer hands to [`DeltaSource::run`].
#[derive(Clone)]
pub struct SourceConfig {
    /// Applies one delta batch; see [`ProcessFunc`].
    pub process: ProcessFunc,
    /// Resync eligibility query; see [`ShouldResyncFunc`].
    pub should_resync: ShouldResyncFunc,
    /// How often the source should tick `should_resync`. Zero disables
    /// resync entirely.
    pub resync_check_period: Duration,
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("resync_check_period", &self.resync_check_period)
            .finish()
    }
}

/// Producer of delta batches from the authoritative state.
///
/// Implementations own listing, watching, retrying, and per-object delta
/// queueing. The informer only requires:
///
/// - [`run`](DeltaSource::run) drives the loop until `stop` fires, invoking
///   `config.process` for each batch and retaining any batch whose
///   processing failed
/// - [`has_synced`](DeltaSource::has_synced) turns true once the first full
///   LIST has been delivered through `process`
/// - [`last_sync_resource_version`](DeltaSource::last_sync_resource_version)
///   reports the version observed at the last sync with the authoritative
///   store
#[async_trait]
pub trait DeltaSource: Send + Sync {
    /// Run the source until `stop` fires.
    async fn run(&self, config: SourceConfig, stop: ShutdownSignal);

    /// Whether the initial full LIST has been applied.
    fn has_synced(&self) -> bool;

    /// Resource version observed at the last sync. Empty before the first.
    fn last_sync_resource_version(&self) -> ResourceVersion;
}
