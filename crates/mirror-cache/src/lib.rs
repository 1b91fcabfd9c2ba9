//! # mirror-cache
//!
//! Thread-safe indexed object store for the mirrorcache object cache.
//!
//! This crate provides the storage layer the informer mutates and listeners
//! read from:
//!
//! - [`IndexedStore`] - Concurrent key→object map with named secondary indices
//! - [`Store`] / [`Indexer`] - Trait seams for consumers that only need a
//!   subset of the surface
//! - [`StoreStats`] - Atomic operation counters
//!
//! ## Key Design Decisions
//!
//! - A single reader-writer lock guards items, indexers, and indices, so
//!   every index update is atomic with the item update it belongs to
//! - Index functions run before any mutation; a failing function leaves the
//!   store untouched
//! - The lock is never held across an await point (all operations are
//!   synchronous)
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mirror_cache::{IndexedStore, Indexers, namespace_index_func, NAMESPACE_INDEX};
//! use mirror_core::deletion_handling_key_func;
//!
//! let mut indexers = Indexers::new();
//! indexers.insert(NAMESPACE_INDEX.to_string(), Arc::new(namespace_index_func));
//!
//! let store = IndexedStore::new(Arc::new(deletion_handling_key_func), indexers);
//! store.add(obj)?;
//! let in_default = store.by_index(NAMESPACE_INDEX, "default")?;
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod index;
mod stats;
mod store;

pub use index::{
    index_func_to_key_func, namespace_index_func, Index, IndexFunc, Indexers, Indices,
    NAMESPACE_INDEX,
};
pub use stats::StoreStats;
pub use store::{Indexer, IndexedStore, Store};
