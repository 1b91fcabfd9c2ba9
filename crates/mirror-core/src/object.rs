//! Object metadata access for mirrored objects.
//!
//! The cache treats objects as opaque values; all it needs is the metadata
//! exposed by the [`ObjectMeta`] trait: namespace, name, and resource
//! version. Implement this trait to store custom object types.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::{ObjectKey, ResourceVersion};

/// Trait giving the cache access to object metadata.
///
/// Implement this trait to make a type storable in the indexed cache and
/// deliverable through informer notifications.
///
/// # Example
///
/// ```rust
/// use std::any::Any;
/// use mirror_core::{ObjectMeta, ResourceVersion};
///
/// #[derive(Debug)]
/// struct Endpoint {
///     namespace: String,
///     name: String,
///     version: ResourceVersion,
///     address: String,
/// }
///
/// impl ObjectMeta for Endpoint {
///     fn namespace(&self) -> Option<&str> {
///         Some(&self.namespace)
///     }
///
///     fn name(&self) -> &str {
///         &self.name
///     }
///
///     fn resource_version(&self) -> &ResourceVersion {
///         &self.version
///     }
///
///     fn as_any(&self) -> &dyn Any {
///         self
///     }
/// }
/// ```
pub trait ObjectMeta: Send + Sync + fmt::Debug {
    /// Namespace of the object, or `None` for cluster-scoped objects.
    fn namespace(&self) -> Option<&str>;

    /// Name of the object. Unique within its namespace.
    fn name(&self) -> &str;

    /// The version of this object as observed at the authoritative source.
    fn resource_version(&self) -> &ResourceVersion;

    /// Convert to `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
}

/// Type alias for a shared, type-erased object.
///
/// Uses `Arc` so objects can be held by the store, the indices, and any
/// number of listeners without copying.
pub type BoxObject = Arc<dyn ObjectMeta>;

/// Marker carrying the last known state of a deleted object.
///
/// A delta source that misses the final delete event (for example after a
/// relist) can only report "this key is gone, and here is the last state we
/// saw". It wraps that state in a `Tombstone`. Key derivation unwraps the
/// marker via [`deletion_handling_key_func`](crate::deletion_handling_key_func);
/// delete notifications pass it through to handlers unchanged, so handlers
/// that inspect deleted objects must check for it.
#[derive(Debug, Clone)]
pub struct Tombstone {
    /// Key of the deleted object.
    pub key: ObjectKey,
    /// Last known state before deletion. May be stale.
    pub object: BoxObject,
}

impl Tombstone {
    /// Create a new tombstone for `key` wrapping the last known state.
    #[must_use]
    pub fn new(key: ObjectKey, object: BoxObject) -> Self {
        Self { key, object }
    }
}

impl ObjectMeta for Tombstone {
    fn namespace(&self) -> Option<&str> {
        self.object.namespace()
    }

    fn name(&self) -> &str {
        self.object.name()
    }

    fn resource_version(&self) -> &ResourceVersion {
        self.object.resource_version()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
