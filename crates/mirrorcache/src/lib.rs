//! # mirrorcache
//!
//! Shared, indexed, eventually-consistent object cache with fan-out event
//! distribution.
//!
//! A [`SharedIndexInformer`](prelude::SharedIndexInformer) links many
//! in-process listeners to the authoritative state of a remote collection of
//! versioned objects: it maintains a local indexed replica fed by a delta
//! source and delivers per-object change notifications to each listener
//! sequentially and in order.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mirrorcache::prelude::*;
//!
//! // Build an informer over your delta source
//! let informer = SharedIndexInformer::builder()
//!     .source(source)
//!     .resync_period(Duration::from_secs(30))
//!     .build()?;
//!
//! // Register a handler
//! informer
//!     .add_event_handler(Arc::new(
//!         EventHandlerFuncs::new().add_fn(|obj| println!("added {}", obj.name())),
//!     ))
//!     .await;
//!
//! // Run until stopped
//! let stop = ShutdownController::new();
//! tokio::spawn(informer.clone().run(stop.signal()));
//! ```
//!
//! ## Architecture
//!
//! This library is organized into several crates:
//!
//! - `mirror-core` - Core types, traits, and error handling
//! - `mirror-cache` - Thread-safe indexed object store
//! - `mirror-informer` - Informer loop, listener fan-out, resync scheduling
//!
//! This crate (`mirrorcache`) re-exports all public APIs for convenience.
//!
//! ## Design Principles
//!
//! 1. **No panics in library code** - All errors are returned as `Result`
//! 2. **The producer never waits on a listener** - Slow handlers buffer in
//!    memory (unbounded, by design) instead of blocking the informer
//! 3. **Index consistency** - Items and secondary indices mutate under one
//!    lock, atomically
//! 4. **Observable** - Structured tracing and store statistics built in

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

// Re-export all sub-crates
pub use mirror_cache as cache;
pub use mirror_core as core;
pub use mirror_informer as informer;

/// Prelude module for convenient imports.
///
/// ```rust
/// use mirrorcache::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use mirror_core::{
        deletion_handling_key_func, meta_namespace_key_func, BoxObject, Clock, KeyFunc,
        ManualClock, MirrorError, ObjectKey, ObjectMeta, RealClock, ResourceVersion, Tombstone,
    };

    // Cache types
    pub use mirror_cache::{
        index_func_to_key_func, namespace_index_func, Index, IndexFunc, Indexer, IndexedStore,
        Indexers, Indices, Store, StoreStats, NAMESPACE_INDEX,
    };

    // Informer types
    pub use mirror_informer::{
        wait_for_cache_sync, Delta, DeltaKind, DeltaSource, Deltas, EventHandlerFuncs,
        InformerSynced, Notification, ProcessFunc, ResourceEventHandler, SharedIndexInformer,
        SharedIndexInformerBuilder, ShouldResyncFunc, ShutdownController, ShutdownSignal,
        SourceConfig,
    };
}

/// Version information for this crate.
pub mod version {
    /// Crate version.
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");

    /// Minimum supported Rust version.
    pub const MSRV: &str = "1.75";

    /// Get version info as a string.
    pub fn version_string() -> String {
        format!("mirrorcache {} (MSRV {})", VERSION, MSRV)
    }
}
