//! Cache sync gate helpers.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::shutdown::ShutdownSignal;

/// Predicate reporting whether an informer's cache has received its initial
/// full LIST. Obtain one by wrapping
/// [`SharedIndexInformer::has_synced`](crate::SharedIndexInformer::has_synced).
pub type InformerSynced = Arc<dyn Fn() -> bool + Send + Sync>;

/// How often the sync predicates are polled.
const SYNCED_POLL_PERIOD: Duration = Duration::from_millis(100);

/// Wait until every sync predicate reports `true`.
///
/// Polls every 100 ms. Returns `true` once all predicates pass, or `false`
/// if `stop` fires first (the caller should shut down).
///
/// # Example
///
/// ```rust,ignore
/// let informer_synced: InformerSynced = {
///     let informer = Arc::clone(&informer);
///     Arc::new(move || informer.has_synced())
/// };
/// if !wait_for_cache_sync(stop.signal(), &[informer_synced]).await {
///     return; // stop requested before the cache populated
/// }
/// ```
pub async fn wait_for_cache_sync(stop: ShutdownSignal, cache_syncs: &[InformerSynced]) -> bool {
    let stopped = stop.wait();
    tokio::pin!(stopped);

    let mut poll = tokio::time::interval(SYNCED_POLL_PERIOD);
    loop {
        tokio::select! {
            _ = &mut stopped => {
                debug!("stop requested while waiting for caches");
                return false;
            }
            _ = poll.tick() => {
                if cache_syncs.iter().all(|synced| synced()) {
                    debug!("caches populated");
                    return true;
                }
            }
        }
    }
}
