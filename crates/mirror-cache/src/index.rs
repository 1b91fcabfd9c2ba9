//! Index types and default index functions.
//!
//! An index function maps an object to the set of string values it should be
//! findable under. The store maintains, for every registered index function,
//! a reverse mapping from index value to the primary keys of matching
//! objects.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use mirror_core::{BoxObject, KeyFunc, MirrorError, ObjectKey, Result};

/// Function computing the index values of an object.
///
/// Must be deterministic for a given object content. The returned list may
/// be empty and may contain duplicates; duplicates collapse in the index.
pub type IndexFunc = Arc<dyn Fn(&BoxObject) -> Result<Vec<String>> + Send + Sync>;

/// Mapping from index name to index function.
pub type Indexers = HashMap<String, IndexFunc>;

/// Mapping from index value to the set of primary keys matching it.
pub type Index = HashMap<String, HashSet<ObjectKey>>;

/// Mapping from index name to its [`Index`].
pub type Indices = HashMap<String, Index>;

/// Name of the default namespace index.
pub const NAMESPACE_INDEX: &str = "namespace";

/// Default index function grouping objects by namespace.
///
/// Cluster-scoped objects index under the empty string so they remain
/// listable as a group.
pub fn namespace_index_func(obj: &BoxObject) -> Result<Vec<String>> {
    Ok(vec![obj.namespace().unwrap_or("").to_string()])
}

/// Adapt an index function into a key function.
///
/// Only useful when the index function returns exactly one value per
/// object; zero or multiple values are an error. Prefer writing a proper
/// key function.
pub fn index_func_to_key_func(index_name: &str, index_func: IndexFunc) -> KeyFunc {
    let index_name = index_name.to_string();
    Arc::new(move |obj: &BoxObject| {
        let mut values = index_func(obj)?;
        match values.len() {
            1 => Ok(ObjectKey::new(values.remove(0))),
            0 => Err(MirrorError::key(format!(
                "index function {index_name:?} returned no values"
            ))),
            n => Err(MirrorError::key(format!(
                "index function {index_name:?} returned {n} values, want exactly one"
            ))),
        }
    })
}
