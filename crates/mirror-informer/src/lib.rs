//! # mirror-informer
//!
//! Shared informer for the mirrorcache object cache.
//!
//! A [`SharedIndexInformer`] links any number of in-process listeners to the
//! authoritative state of a remote object collection: it consumes delta
//! batches from a [`DeltaSource`], mutates the local [`IndexedStore`]
//! replica, and fans per-object change notifications out to every registered
//! [`ResourceEventHandler`] — sequentially and in order per listener.
//!
//! ## Guarantees
//!
//! - Per listener and object key, notifications arrive in delta order
//! - Per listener, notifications are delivered sequentially on one task
//! - Cache mutation happens before the corresponding notification
//! - A slow or stalled listener never blocks the producer or its peers;
//!   its pending notifications buffer in memory instead, without bound
//!
//! ## Example
//!
//! ```rust,ignore
//! use mirror_informer::{SharedIndexInformer, EventHandlerFuncs, ShutdownController};
//!
//! let informer = SharedIndexInformer::builder()
//!     .source(source)
//!     .resync_period(Duration::from_secs(30))
//!     .build()?;
//!
//! informer
//!     .add_event_handler(Arc::new(
//!         EventHandlerFuncs::new().add_fn(|obj| println!("added {}", obj.name())),
//!     ))
//!     .await;
//!
//! let stop = ShutdownController::new();
//! tokio::spawn(informer.clone().run(stop.signal()));
//! ```
//!
//! [`IndexedStore`]: mirror_cache::IndexedStore

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod delta;
mod handler;
mod informer;
mod listener;
mod processor;
mod resync;
mod shutdown;
mod source;
mod sync;

pub use delta::{Delta, DeltaKind, Deltas};
pub use handler::{EventHandlerFuncs, Notification, ResourceEventHandler};
pub use informer::{SharedIndexInformer, SharedIndexInformerBuilder};
pub use shutdown::{ShutdownController, ShutdownSignal};
pub use source::{DeltaSource, ProcessFunc, ShouldResyncFunc, SourceConfig};
pub use sync::{wait_for_cache_sync, InformerSynced};
