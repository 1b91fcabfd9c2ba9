//! Primary keys for mirrored objects.
//!
//! Every object is stored under one string key, `namespace/name` for
//! namespaced objects and bare `name` for cluster-scoped ones. Keys stay
//! plain strings so they remain readable in logs, index sets, and
//! `list_keys` output. [`meta_namespace_key_func`] derives the key from
//! object metadata; [`deletion_handling_key_func`] additionally unwraps
//! [`Tombstone`] markers on delete deltas.

use std::fmt;
use std::sync::Arc;

use crate::{BoxObject, MirrorError, Result, Tombstone};

/// Function deriving the primary key for an object.
pub type KeyFunc = Arc<dyn Fn(&BoxObject) -> Result<ObjectKey> + Send + Sync>;

/// Primary key of a mirrored object.
///
/// Construct through [`from_parts`](ObjectKey::from_parts) (or a key
/// function) so namespacing stays consistent; [`split`](ObjectKey::split)
/// is the inverse.
///
/// # Example
///
/// ```rust
/// use mirror_core::ObjectKey;
///
/// let key = ObjectKey::from_parts(Some("default"), "web-1");
/// assert_eq!(key.as_str(), "default/web-1");
/// assert_eq!(key.split(), (Some("default"), "web-1"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Wrap an already formatted key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Build a key from an optional namespace and a name. An empty or
    /// missing namespace yields a cluster-scoped key.
    #[must_use]
    pub fn from_parts(namespace: Option<&str>, name: &str) -> Self {
        match namespace {
            Some(ns) if !ns.is_empty() => Self(format!("{ns}/{name}")),
            _ => Self(name.to_string()),
        }
    }

    /// Split the key back into `(namespace, name)`.
    #[must_use]
    pub fn split(&self) -> (Option<&str>, &str) {
        match self.0.split_once('/') {
            Some((ns, name)) => (Some(ns), name),
            None => (None, &self.0),
        }
    }

    /// The key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Default key function: `namespace/name`, or bare `name` for
/// cluster-scoped objects.
///
/// Fails if the object has an empty name, since such a key could collide
/// with another object's namespace prefix.
pub fn meta_namespace_key_func(obj: &BoxObject) -> Result<ObjectKey> {
    if obj.name().is_empty() {
        return Err(MirrorError::key("object has no name"));
    }
    Ok(ObjectKey::from_parts(obj.namespace(), obj.name()))
}

/// Deletion-aware variant of [`meta_namespace_key_func`].
///
/// Unwraps [`Tombstone`] markers so delete deltas whose final state was not
/// observed still resolve to the right key.
pub fn deletion_handling_key_func(obj: &BoxObject) -> Result<ObjectKey> {
    if let Some(tombstone) = obj.as_any().downcast_ref::<Tombstone>() {
        return Ok(tombstone.key.clone());
    }
    meta_namespace_key_func(obj)
}
