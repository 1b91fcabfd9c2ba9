//! Thread-safe indexed object store.
//!
//! [`IndexedStore`] maps primary keys to objects and maintains any number of
//! named secondary indices over them. One reader-writer lock guards items,
//! indexers, and indices together, so secondary indices are always derived
//! exactly from the current items.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use tracing::trace;

use mirror_core::{BoxObject, KeyFunc, MirrorError, ObjectKey, ResourceVersion, Result};

use crate::index::{Index, Indexers, Indices};
use crate::stats::StoreStats;

/// Key-value storage interface for mirrored objects.
///
/// The primary key of every object is derived by the [`KeyFunc`] supplied at
/// store construction.
pub trait Store: Send + Sync {
    /// Insert an object, replacing any previous object under the same key.
    fn add(&self, obj: BoxObject) -> Result<()>;

    /// Update an object. Identical to [`add`](Store::add) for this storage
    /// model; kept separate so callers express intent and statistics stay
    /// meaningful.
    fn update(&self, obj: BoxObject) -> Result<()>;

    /// Remove the object stored under `obj`'s key, if any.
    fn delete(&self, obj: &BoxObject) -> Result<()>;

    /// List all stored objects. Order is unspecified.
    fn list(&self) -> Vec<BoxObject>;

    /// List all primary keys. Order is unspecified.
    fn list_keys(&self) -> Vec<ObjectKey>;

    /// Look up the stored object with the same key as `obj`.
    fn get(&self, obj: &BoxObject) -> Result<Option<BoxObject>>;

    /// Look up an object by primary key.
    fn get_by_key(&self, key: &ObjectKey) -> Option<BoxObject>;

    /// Atomically substitute the entire store contents.
    ///
    /// Used for the initial LIST and for relists. The resource version is
    /// accepted for interface compatibility; version bookkeeping belongs to
    /// the delta source.
    fn replace(&self, objects: Vec<BoxObject>, resource_version: ResourceVersion) -> Result<()>;
}

/// A [`Store`] that additionally supports named secondary indices.
pub trait Indexer: Store {
    /// Return all objects sharing at least one index value with `obj` under
    /// the named index. Deduplicated; order unspecified.
    fn index(&self, index_name: &str, obj: &BoxObject) -> Result<Vec<BoxObject>>;

    /// Return the primary keys indexed under the exact `index_value`.
    fn index_keys(&self, index_name: &str, index_value: &str) -> Result<Vec<ObjectKey>>;

    /// Return the objects indexed under the exact `index_value`.
    fn by_index(&self, index_name: &str, index_value: &str) -> Result<Vec<BoxObject>>;

    /// Return every index value currently present in the named index.
    /// Unknown index names yield an empty list.
    fn list_index_func_values(&self, index_name: &str) -> Vec<String>;

    /// Return the registered indexers.
    fn get_indexers(&self) -> Indexers;

    /// Register additional indexers. Fails if any name is already taken.
    ///
    /// Existing items are indexed under the new functions before the
    /// registration takes effect.
    fn add_indexers(&self, new_indexers: Indexers) -> Result<()>;
}

/// Concurrent key→object map with named secondary indices.
///
/// ## Thread Safety
///
/// All operations are thread-safe. A single `RwLock` guards items and
/// indices, which keeps the index-consistency invariant simple: for every
/// registered index function `f` and stored `(key, obj)`, `key` appears in
/// the index under value `v` iff `v ∈ f(obj)`.
///
/// ## Failure atomicity
///
/// Index functions run before any mutation, so an operation that fails
/// leaves both items and indices unchanged.
pub struct IndexedStore {
    /// Derives the primary key of an object.
    key_func: KeyFunc,
    /// Operation statistics.
    stats: StoreStats,
    /// Items, indexers, and indices under one lock.
    state: RwLock<StoreState>,
}

impl std::fmt::Debug for IndexedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexedStore")
            .field("state", &self.state)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

struct StoreState {
    items: HashMap<ObjectKey, BoxObject>,
    indexers: Indexers,
    indices: Indices,
}

impl std::fmt::Debug for StoreState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreState")
            .field("items", &self.items.len())
            .field("indexers", &self.indexers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Per-index value transition for one object: (index name, old values, new values).
type IndexTransitions = Vec<(String, Vec<String>, Vec<String>)>;

impl StoreState {
    /// Run every index function over the old and new state of one object.
    /// Performed before mutation so failures leave the store untouched.
    fn index_transitions(
        &self,
        old: Option<&BoxObject>,
        new: Option<&BoxObject>,
    ) -> Result<IndexTransitions> {
        let mut transitions = Vec::with_capacity(self.indexers.len());
        for (name, index_func) in &self.indexers {
            let old_values = match old {
                Some(obj) => index_func(obj)?,
                None => Vec::new(),
            };
            let new_values = match new {
                Some(obj) => index_func(obj)?,
                None => Vec::new(),
            };
            transitions.push((name.clone(), old_values, new_values));
        }
        Ok(transitions)
    }

    fn apply_transitions(&mut self, transitions: IndexTransitions, key: &ObjectKey) {
        for (name, old_values, new_values) in transitions {
            // Common case: unchanged single value, nothing to do.
            if old_values.len() == 1 && new_values.len() == 1 && old_values[0] == new_values[0] {
                continue;
            }
            let index = self.indices.entry(name).or_default();
            for value in &old_values {
                if let Some(keys) = index.get_mut(value) {
                    keys.remove(key);
                    if keys.is_empty() {
                        index.remove(value);
                    }
                }
            }
            for value in new_values {
                index.entry(value).or_default().insert(key.clone());
            }
        }
    }

    fn insert(&mut self, key: ObjectKey, obj: BoxObject) -> Result<()> {
        let old = self.items.get(&key).cloned();
        let transitions = self.index_transitions(old.as_ref(), Some(&obj))?;
        self.items.insert(key.clone(), obj);
        self.apply_transitions(transitions, &key);
        Ok(())
    }

    /// Remove `key` if present. Returns whether an object was removed.
    fn remove(&mut self, key: &ObjectKey) -> Result<bool> {
        let Some(old) = self.items.get(key).cloned() else {
            return Ok(false);
        };
        let transitions = self.index_transitions(Some(&old), None)?;
        self.items.remove(key);
        self.apply_transitions(transitions, key);
        Ok(true)
    }
}

impl IndexedStore {
    /// Create a store with the given key function and indexers.
    pub fn new(key_func: KeyFunc, indexers: Indexers) -> Self {
        Self {
            key_func,
            stats: StoreStats::new(),
            state: RwLock::new(StoreState {
                items: HashMap::new(),
                indexers,
                indices: Indices::new(),
            }),
        }
    }

    /// Get store statistics.
    #[inline]
    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.state.read().expect("store lock poisoned").items.len()
    }

    /// Check whether the store holds no objects.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Store for IndexedStore {
    fn add(&self, obj: BoxObject) -> Result<()> {
        let key = (self.key_func)(&obj)?;
        let mut state = self.state.write().expect("store lock poisoned");
        state.insert(key.clone(), obj)?;
        drop(state);

        self.stats.record_add();
        trace!(key = %key, "added object");
        Ok(())
    }

    fn update(&self, obj: BoxObject) -> Result<()> {
        let key = (self.key_func)(&obj)?;
        let mut state = self.state.write().expect("store lock poisoned");
        state.insert(key.clone(), obj)?;
        drop(state);

        self.stats.record_update();
        trace!(key = %key, "updated object");
        Ok(())
    }

    fn delete(&self, obj: &BoxObject) -> Result<()> {
        let key = (self.key_func)(obj)?;
        let mut state = self.state.write().expect("store lock poisoned");
        let removed = state.remove(&key)?;
        drop(state);

        if removed {
            self.stats.record_delete();
            trace!(key = %key, "deleted object");
        }
        Ok(())
    }

    fn list(&self) -> Vec<BoxObject> {
        let state = self.state.read().expect("store lock poisoned");
        state.items.values().cloned().collect()
    }

    fn list_keys(&self) -> Vec<ObjectKey> {
        let state = self.state.read().expect("store lock poisoned");
        state.items.keys().cloned().collect()
    }

    fn get(&self, obj: &BoxObject) -> Result<Option<BoxObject>> {
        let key = (self.key_func)(obj)?;
        Ok(self.get_by_key(&key))
    }

    fn get_by_key(&self, key: &ObjectKey) -> Option<BoxObject> {
        let state = self.state.read().expect("store lock poisoned");
        let result = state.items.get(key).cloned();
        drop(state);

        if result.is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
        result
    }

    fn replace(&self, objects: Vec<BoxObject>, resource_version: ResourceVersion) -> Result<()> {
        let mut state = self.state.write().expect("store lock poisoned");

        // Build the replacement contents completely before swapping them in,
        // so a failing key or index function leaves the store unchanged.
        let mut items = HashMap::with_capacity(objects.len());
        for obj in objects {
            let key = (self.key_func)(&obj)?;
            items.insert(key, obj);
        }

        let mut indices = Indices::new();
        for (name, index_func) in &state.indexers {
            let mut index = Index::new();
            for (key, obj) in &items {
                for value in index_func(obj)? {
                    index
                        .entry(value)
                        .or_insert_with(HashSet::new)
                        .insert(key.clone());
                }
            }
            indices.insert(name.clone(), index);
        }

        state.items = items;
        state.indices = indices;
        let count = state.items.len();
        drop(state);

        self.stats.record_replace();
        trace!(
            objects = count,
            resource_version = %resource_version,
            "replaced store contents"
        );
        Ok(())
    }
}

impl Indexer for IndexedStore {
    fn index(&self, index_name: &str, obj: &BoxObject) -> Result<Vec<BoxObject>> {
        let state = self.state.read().expect("store lock poisoned");
        let index_func = state
            .indexers
            .get(index_name)
            .ok_or_else(|| MirrorError::UnknownIndex {
                name: index_name.to_string(),
            })?;
        let values = index_func(obj)?;

        let Some(index) = state.indices.get(index_name) else {
            return Ok(Vec::new());
        };

        let mut keys: HashSet<&ObjectKey> = HashSet::new();
        for value in &values {
            if let Some(matched) = index.get(value) {
                keys.extend(matched.iter());
            }
        }
        Ok(keys
            .into_iter()
            .filter_map(|key| state.items.get(key).cloned())
            .collect())
    }

    fn index_keys(&self, index_name: &str, index_value: &str) -> Result<Vec<ObjectKey>> {
        let state = self.state.read().expect("store lock poisoned");
        if !state.indexers.contains_key(index_name) {
            return Err(MirrorError::UnknownIndex {
                name: index_name.to_string(),
            });
        }
        Ok(state
            .indices
            .get(index_name)
            .and_then(|index| index.get(index_value))
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn by_index(&self, index_name: &str, index_value: &str) -> Result<Vec<BoxObject>> {
        let state = self.state.read().expect("store lock poisoned");
        if !state.indexers.contains_key(index_name) {
            return Err(MirrorError::UnknownIndex {
                name: index_name.to_string(),
            });
        }
        Ok(state
            .indices
            .get(index_name)
            .and_then(|index| index.get(index_value))
            .map(|keys| {
                keys.iter()
                    .filter_map(|key| state.items.get(key).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_index_func_values(&self, index_name: &str) -> Vec<String> {
        let state = self.state.read().expect("store lock poisoned");
        state
            .indices
            .get(index_name)
            .map(|index| index.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn get_indexers(&self) -> Indexers {
        let state = self.state.read().expect("store lock poisoned");
        state.indexers.clone()
    }

    fn add_indexers(&self, new_indexers: Indexers) -> Result<()> {
        let mut state = self.state.write().expect("store lock poisoned");

        for name in new_indexers.keys() {
            if state.indexers.contains_key(name) {
                return Err(MirrorError::IndexConflict { name: name.clone() });
            }
        }

        // Index existing items under the new functions before committing.
        let mut built = Vec::with_capacity(new_indexers.len());
        for (name, index_func) in &new_indexers {
            let mut index = Index::new();
            for (key, obj) in &state.items {
                for value in index_func(obj)? {
                    index
                        .entry(value)
                        .or_insert_with(HashSet::new)
                        .insert(key.clone());
                }
            }
            built.push((name.clone(), index));
        }

        for (name, index) in built {
            state.indices.insert(name, index);
        }
        state.indexers.extend(new_indexers);
        Ok(())
    }
}
