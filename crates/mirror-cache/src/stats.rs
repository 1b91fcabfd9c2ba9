//! Store statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics for store operations.
///
/// All counters are atomic and can be safely accessed from multiple threads.
#[derive(Debug, Default)]
pub struct StoreStats {
    /// Number of objects added.
    adds: AtomicU64,
    /// Number of objects updated in place.
    updates: AtomicU64,
    /// Number of objects deleted.
    deletes: AtomicU64,
    /// Number of whole-content replacements.
    replaces: AtomicU64,
    /// Number of key lookups that found an object.
    hits: AtomicU64,
    /// Number of key lookups that missed.
    misses: AtomicU64,
}

impl StoreStats {
    /// Create new store statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an add operation.
    #[inline]
    pub fn record_add(&self) {
        self.adds.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an update operation.
    #[inline]
    pub fn record_update(&self) {
        self.updates.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a delete operation.
    #[inline]
    pub fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a replace operation.
    #[inline]
    pub fn record_replace(&self) {
        self.replaces.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a lookup hit.
    #[inline]
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a lookup miss.
    #[inline]
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total adds.
    #[inline]
    pub fn adds(&self) -> u64 {
        self.adds.load(Ordering::Relaxed)
    }

    /// Get total updates.
    #[inline]
    pub fn updates(&self) -> u64 {
        self.updates.load(Ordering::Relaxed)
    }

    /// Get total deletes.
    #[inline]
    pub fn deletes(&self) -> u64 {
        self.deletes.load(Ordering::Relaxed)
    }

    /// Get total replaces.
    #[inline]
    pub fn replaces(&self) -> u64 {
        self.replaces.load(Ordering::Relaxed)
    }

    /// Get total lookup hits.
    #[inline]
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Get total lookup misses.
    #[inline]
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Lookup hit rate in `[0.0, 1.0]`. Returns 0.0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total == 0.0 {
            0.0
        } else {
            hits / total
        }
    }
}
