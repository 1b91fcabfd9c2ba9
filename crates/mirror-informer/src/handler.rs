//! Event handlers and the notifications delivered to them.

use std::fmt;

use mirror_core::BoxObject;

/// A change notification delivered to a listener.
///
/// Cloning is cheap: the payloads are shared `Arc`s.
#[derive(Clone, Debug)]
pub enum Notification {
    /// An object appeared in the cache (or is being replayed to a new or
    /// resyncing listener).
    Add {
        /// The object as stored.
        new: BoxObject,
    },
    /// An object changed.
    Update {
        /// State before the change.
        old: BoxObject,
        /// State after the change.
        new: BoxObject,
    },
    /// An object was removed from the cache.
    Delete {
        /// Last known state. May be a [`Tombstone`](mirror_core::Tombstone)
        /// when the source missed the final delete event.
        old: BoxObject,
    },
}

/// Receiver of cache change notifications.
///
/// For every cache update and every registered handler, the informer
/// eventually invokes the matching method — after the corresponding cache
/// and index updates, sequentially per handler, and in order per object key.
/// There is no coordination between different handlers.
///
/// Handler methods run on the listener's dispatch task. A panicking method
/// is caught and logged; the offending notification is skipped (never
/// retried), the dispatch task backs off briefly, and delivery continues
/// with the next notification.
pub trait ResourceEventHandler: Send + Sync {
    /// An object was added.
    fn on_add(&self, obj: BoxObject);

    /// An object was updated.
    fn on_update(&self, old: BoxObject, new: BoxObject);

    /// An object was deleted. `obj` may be a
    /// [`Tombstone`](mirror_core::Tombstone).
    fn on_delete(&self, obj: BoxObject);
}

type AddFn = Box<dyn Fn(BoxObject) + Send + Sync>;
type UpdateFn = Box<dyn Fn(BoxObject, BoxObject) + Send + Sync>;
type DeleteFn = Box<dyn Fn(BoxObject) + Send + Sync>;

/// Closure-based [`ResourceEventHandler`] for callers that only care about
/// some of the notification kinds.
///
/// # Example
///
/// ```rust
/// use mirror_core::ObjectMeta;
/// use mirror_informer::EventHandlerFuncs;
///
/// let handler = EventHandlerFuncs::new()
///     .add_fn(|obj| println!("added {}", obj.name()))
///     .delete_fn(|obj| println!("deleted {}", obj.name()));
/// ```
#[derive(Default)]
pub struct EventHandlerFuncs {
    add_fn: Option<AddFn>,
    update_fn: Option<UpdateFn>,
    delete_fn: Option<DeleteFn>,
}

impl EventHandlerFuncs {
    /// Create a handler that ignores everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the closure invoked on adds.
    #[must_use]
    pub fn add_fn(mut self, f: impl Fn(BoxObject) + Send + Sync + 'static) -> Self {
        self.add_fn = Some(Box::new(f));
        self
    }

    /// Set the closure invoked on updates.
    #[must_use]
    pub fn update_fn(mut self, f: impl Fn(BoxObject, BoxObject) + Send + Sync + 'static) -> Self {
        self.update_fn = Some(Box::new(f));
        self
    }

    /// Set the closure invoked on deletes.
    #[must_use]
    pub fn delete_fn(mut self, f: impl Fn(BoxObject) + Send + Sync + 'static) -> Self {
        self.delete_fn = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for EventHandlerFuncs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlerFuncs")
            .field("add_fn", &self.add_fn.is_some())
            .field("update_fn", &self.update_fn.is_some())
            .field("delete_fn", &self.delete_fn.is_some())
            .finish()
    }
}

impl ResourceEventHandler for EventHandlerFuncs {
    fn on_add(&self, obj: BoxObject) {
        if let Some(f) = &self.add_fn {
            f(obj);
        }
    }

    fn on_update(&self, old: BoxObject, new: BoxObject) {
        if let Some(f) = &self.update_fn {
            f(old, new);
        }
    }

    fn on_delete(&self, obj: BoxObject) {
        if let Some(f) = &self.delete_fn {
            f(obj);
        }
    }
}
