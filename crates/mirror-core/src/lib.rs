//! # mirror-core
//!
//! Core types, traits, and error handling for the mirrorcache object cache.
//!
//! This crate provides the foundational types used across all other mirror
//! crates:
//!
//! - [`MirrorError`] - Comprehensive error type for cache and informer operations
//! - [`ResourceVersion`] - Version tracking for mirrored objects
//! - [`ObjectKey`] - Primary key for objects (`namespace/name` or bare `name`)
//! - [`ObjectMeta`] - Trait giving the cache access to object metadata
//! - [`Tombstone`] - Marker for objects whose final state was not observed
//! - [`Clock`] - Time source abstraction for testable scheduling
//!
//! ## Example
//!
//! ```rust
//! use mirror_core::{ObjectKey, ResourceVersion};
//!
//! let key = ObjectKey::new("default/web-1");
//! let (namespace, name) = key.split();
//!
//! assert_eq!(namespace, Some("default"));
//! assert_eq!(name, "web-1");
//! assert!(ResourceVersion::empty().is_empty());
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clock;
mod error;
mod key;
mod object;
mod version;

pub use clock::{Clock, ManualClock, RealClock};
pub use error::MirrorError;
pub use key::{deletion_handling_key_func, meta_namespace_key_func, KeyFunc, ObjectKey};
pub use object::{BoxObject, ObjectMeta, Tombstone};
pub use version::ResourceVersion;

/// Result type alias using [`MirrorError`].
pub type Result<T> = std::result::Result<T, MirrorError>;
