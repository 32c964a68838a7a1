//! Keyed, thread-safe event handler registry with a weak back-reference to
//! its notification source.
//!
//! A [`KeyedHandlerRegistry`] maps each event key to its own [`HandlerList`]
//! and keeps one extra catch-all list that sees every event. Dispatch runs the
//! keyed list for the event's key first, then the catch-all list, each in
//! registration order.
//!
//! # Locking
//!
//! Two levels. The structural guard around the key map is held only to find
//! or create a list; each list has its own reentrant guard, held while
//! appending to it, removing from it, or running its handlers. The structural
//! guard is never held together with a list guard or while handlers run, so
//! slow handlers on one key never stall another key.
//!
//! A dispatch runs over a snapshot of the list taken under its guard: a
//! handler added during the dispatch first runs on the next one, and a
//! handler removed during the dispatch still runs in the current one.
//!
//! # Examples
//!
//! ```
//! use stateful_core::{KeyedEvent, KeyedHandlerRegistry};
//! use std::sync::{Arc, Mutex};
//!
//! struct Changed(&'static str);
//!
//! impl KeyedEvent for Changed {
//!     type Key = &'static str;
//!     fn key(&self) -> Option<&Self::Key> {
//!         Some(&self.0)
//!     }
//! }
//!
//! let source = Arc::new(String::from("model"));
//! let registry: KeyedHandlerRegistry<String, Changed> = KeyedHandlerRegistry::new(&source);
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let log = seen.clone();
//! registry.register_for("title", move |_source, event: &Changed| {
//!     log.lock().unwrap().push(event.0);
//!     Ok(())
//! });
//!
//! registry.dispatch(&Changed("title")).unwrap();
//! assert_eq!(*seen.lock().unwrap(), vec!["title"]);
//!
//! drop(source);
//! registry.dispatch(&Changed("title")).unwrap(); // source gone: no-op
//! assert_eq!(seen.lock().unwrap().len(), 1);
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use parking_lot::ReentrantMutex;

use crate::{BoxError, Error, KeyedEvent, RegistryEvent, ScopedResource};

/// Identifies one handler registration within a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl HandlerId {
    /// The raw id value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registered handler: receives the live source and the dispatched event.
pub type Handler<S, E> = Arc<dyn Fn(&Arc<S>, &E) -> Result<(), BoxError> + Send + Sync>;

/// Type alias for the user-supplied trace callback.
///
/// Invoked with no registry lock held, so it may call back into the registry.
pub type TraceCallback = dyn Fn(&RegistryEvent) + Send + Sync + 'static;

struct Entry<S, E> {
    id: HandlerId,
    handler: Handler<S, E>,
}

/// An ordered list of handlers guarded by its own reentrant lock.
///
/// The guard serializes appends, removals and dispatches on this list across
/// threads. The thread running a dispatch may re-enter it, so a handler can
/// register, unregister or dispatch on the list it is running under.
///
/// Cloning a `HandlerList` yields another handle to the same list.
pub struct HandlerList<S, E> {
    entries: Arc<ReentrantMutex<RefCell<Vec<Entry<S, E>>>>>,
}

impl<S, E> Clone for HandlerList<S, E> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<S, E> Default for HandlerList<S, E> {
    fn default() -> Self {
        Self {
            entries: Arc::new(ReentrantMutex::new(RefCell::new(Vec::new()))),
        }
    }
}

impl<S, E> HandlerList<S, E> {
    fn push(&self, id: HandlerId, handler: Handler<S, E>) {
        let guard = self.entries.lock();
        guard.borrow_mut().push(Entry { id, handler });
    }

    fn remove(&self, id: HandlerId) -> bool {
        let guard = self.entries.lock();
        let mut entries = guard.borrow_mut();
        match entries.iter().position(|entry| entry.id == id) {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Invoke a snapshot of the handlers in order under this list's guard.
    ///
    /// Stops at the first error. Returns the number of handlers that ran
    /// successfully.
    fn invoke(&self, source: &Arc<S>, event: &E) -> Result<usize, Error> {
        let guard = self.entries.lock();
        let handlers: Vec<Handler<S, E>> = guard
            .borrow()
            .iter()
            .map(|entry| Arc::clone(&entry.handler))
            .collect();

        for handler in &handlers {
            handler(source, event).map_err(Error::Handler)?;
        }
        drop(guard);
        Ok(handlers.len())
    }

    /// Number of handlers in the list.
    pub fn len(&self) -> usize {
        let guard = self.entries.lock();
        let len = guard.borrow().len();
        len
    }

    /// Whether the list has no handlers.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registration ids in dispatch order.
    pub fn ids(&self) -> Vec<HandlerId> {
        let guard = self.entries.lock();
        let ids = guard.borrow().iter().map(|entry| entry.id).collect();
        ids
    }
}

impl<S, E> fmt::Debug for HandlerList<S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerList")
            .field("ids", &self.ids())
            .finish()
    }
}

/// Keyed event multiplexer observing a source through a weak reference.
///
/// The registry never keeps the source alive. Once every `Arc<S>` is gone,
/// [`dispatch`](KeyedHandlerRegistry::dispatch) returns `Ok(())` without
/// invoking anything.
///
/// # Re-entrancy
///
/// Handlers run while their list's guard is held, and that guard is
/// reentrant. From inside a handler, the dispatching thread may register,
/// unregister, release subscriptions, and dispatch on any key, its own
/// included. A handler that dispatches the event it is handling recurses
/// without bound.
///
/// Across threads, a running dispatch holds its list's guard until its
/// handlers return. Two threads whose handlers dispatch into each other's
/// lists in opposite order can deadlock.
pub struct KeyedHandlerRegistry<S, E: KeyedEvent> {
    source: Weak<S>,
    lists: Mutex<HashMap<E::Key, HandlerList<S, E>>>,
    owners: Mutex<HashMap<HandlerId, Option<E::Key>>>,
    catch_all: HandlerList<S, E>,
    next_id: AtomicU64,
    trace: Mutex<Option<Arc<TraceCallback>>>,
}

impl<S, E> KeyedHandlerRegistry<S, E>
where
    S: 'static,
    E: KeyedEvent + 'static,
{
    /// Create a registry observing `source`.
    pub fn new(source: &Arc<S>) -> Self {
        Self::with_weak(Arc::downgrade(source))
    }

    /// Create a registry from a weak handle to the source.
    ///
    /// A handle obtained inside [`Arc::new_cyclic`] is accepted, which lets a
    /// source own its registry.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `source` is a null handle created by
    /// [`Weak::new`], i.e. it was never associated with any source.
    pub fn from_weak(source: Weak<S>) -> Result<Self, Error> {
        if source.ptr_eq(&Weak::new()) {
            return Err(Error::InvalidArgument("source"));
        }
        Ok(Self::with_weak(source))
    }

    /// Create a registry and register `handler` on the catch-all channel.
    pub fn with_handler(
        source: &Arc<S>,
        handler: impl Fn(&Arc<S>, &E) -> Result<(), BoxError> + Send + Sync + 'static,
    ) -> Self {
        let registry = Self::new(source);
        registry.register(handler);
        registry
    }

    fn with_weak(source: Weak<S>) -> Self {
        Self {
            source,
            lists: Mutex::new(HashMap::new()),
            owners: Mutex::new(HashMap::new()),
            catch_all: HandlerList::default(),
            next_id: AtomicU64::new(1),
            trace: Mutex::new(None),
        }
    }

    // -------------------------------------------------------------------------------------------------
    // Tracing
    // -------------------------------------------------------------------------------------------------

    /// Set a callback invoked for every registry operation.
    ///
    /// Replaces any previous callback.
    pub fn set_trace_callback(&self, callback: impl Fn(&RegistryEvent) + Send + Sync + 'static) {
        let mut guard = self.trace.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(Arc::new(callback));
    }

    /// Remove the trace callback.
    pub fn clear_trace_callback(&self) {
        let mut guard = self.trace.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = None;
    }

    fn emit_event(&self, event: RegistryEvent) {
        tracing::trace!(%event, "handler registry");

        let callback = self
            .trace
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(callback) = callback {
            callback(&event);
        }
    }

    // -------------------------------------------------------------------------------------------------
    // Registration
    // -------------------------------------------------------------------------------------------------

    fn next_id(&self) -> HandlerId {
        HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Append `handler` to the catch-all list.
    pub fn register(
        &self,
        handler: impl Fn(&Arc<S>, &E) -> Result<(), BoxError> + Send + Sync + 'static,
    ) -> HandlerId {
        self.register_handler(None, Arc::new(handler))
    }

    /// Append `handler` to the list for `key`, creating the list on first use.
    ///
    /// A catch-all alias key (see [`KeyedEvent::is_catch_all_key`]) appends to
    /// the catch-all list instead.
    pub fn register_for(
        &self,
        key: E::Key,
        handler: impl Fn(&Arc<S>, &E) -> Result<(), BoxError> + Send + Sync + 'static,
    ) -> HandlerId {
        self.register_handler(Some(key), Arc::new(handler))
    }

    /// Append several handlers under `key`, preserving their order.
    pub fn register_many(
        &self,
        key: E::Key,
        handlers: impl IntoIterator<Item = Handler<S, E>>,
    ) -> Vec<HandlerId> {
        handlers
            .into_iter()
            .map(|handler| self.register_handler(Some(key.clone()), handler))
            .collect()
    }

    /// Append an already shared handler. `None` targets the catch-all list.
    pub fn register_handler(&self, key: Option<E::Key>, handler: Handler<S, E>) -> HandlerId {
        let id = self.next_id();
        let key = key.filter(|key| !E::is_catch_all_key(key));

        let list = match &key {
            Some(key) => self.list_for(key),
            None => self.catch_all.clone(),
        };
        list.push(id, handler);
        self.owners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, key.clone());

        self.emit_event(RegistryEvent::Register {
            key: key.as_ref().map(|key| format!("{key:?}")),
            id: id.get(),
        });
        id
    }

    /// Fetch or create the list for `key` under the structural guard only.
    fn list_for(&self, key: &E::Key) -> HandlerList<S, E> {
        let mut lists = self.lists.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(list) = lists.get(key) {
            return list.clone();
        }

        tracing::debug!(?key, "creating handler list");
        let list = HandlerList::default();
        lists.insert(key.clone(), list.clone());
        list
    }

    fn find_list(&self, key: &E::Key) -> Option<HandlerList<S, E>> {
        self.lists
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Remove the registration `id`. Returns whether it was found.
    ///
    /// Only the list that owns `id` is locked. Empty lists are kept, so the
    /// key's guard stays stable.
    pub fn unregister(&self, id: HandlerId) -> bool {
        let owner = self
            .owners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        let found = match owner {
            Some(Some(key)) => self.find_list(&key).is_some_and(|list| list.remove(id)),
            Some(None) => self.catch_all.remove(id),
            None => false,
        };

        tracing::debug!(%id, found, "unregistering handler");
        self.emit_event(RegistryEvent::Unregister {
            id: id.get(),
            found,
        });
        found
    }

    // -------------------------------------------------------------------------------------------------
    // Dispatch
    // -------------------------------------------------------------------------------------------------

    /// Dispatch `event` to the keyed list for its key, then to the catch-all list.
    ///
    /// Handlers are called synchronously on this thread, in registration
    /// order, with the live source and `event`. If the source has been
    /// dropped this returns `Ok(())` and calls nothing.
    ///
    /// # Errors
    ///
    /// [`Error::Handler`] with the first handler error. The remaining handlers
    /// of that list are skipped, and an error in the keyed tier also skips the
    /// catch-all tier.
    pub fn dispatch(&self, event: &E) -> Result<(), Error> {
        let Some(source) = self.source.upgrade() else {
            self.emit_event(RegistryEvent::SourceDropped);
            return Ok(());
        };

        let mut invoked = 0;
        if let Some(key) = event.routing_key() {
            if let Some(list) = self.find_list(key) {
                invoked += list.invoke(&source, event)?;
            }
        }
        invoked += self.catch_all.invoke(&source, event)?;

        self.emit_event(RegistryEvent::Dispatch {
            key: event.routing_key().map(|key| format!("{key:?}")),
            handlers: invoked,
        });
        Ok(())
    }

    // -------------------------------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------------------------------

    /// Point-in-time copy of the key to list mapping.
    ///
    /// The lists themselves are live handles; the set of keys is not.
    pub fn snapshot(&self) -> Vec<(E::Key, HandlerList<S, E>)> {
        self.lists
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(key, list)| (key.clone(), list.clone()))
            .collect()
    }

    /// The catch-all list.
    pub fn catch_all(&self) -> &HandlerList<S, E> {
        &self.catch_all
    }

    /// Total handlers across all keyed lists and the catch-all list.
    pub fn handler_count(&self) -> usize {
        self.catch_all.len()
            + self
                .snapshot()
                .iter()
                .map(|(_, list)| list.len())
                .sum::<usize>()
    }

    /// The source, if it is still alive.
    pub fn source(&self) -> Option<Arc<S>> {
        self.source.upgrade()
    }

    /// Whether the source is still alive.
    pub fn is_source_alive(&self) -> bool {
        self.source.strong_count() > 0
    }
}

impl<S, E> KeyedHandlerRegistry<S, E>
where
    S: Send + Sync + 'static,
    E: KeyedEvent + 'static,
    E::Key: Send,
{
    /// Register on the catch-all list; releasing the returned resource
    /// unregisters the handler.
    ///
    /// The resource refers to the registry weakly, so it never keeps the
    /// registry alive.
    pub fn subscribe(
        self: &Arc<Self>,
        handler: impl Fn(&Arc<S>, &E) -> Result<(), BoxError> + Send + Sync + 'static,
    ) -> ScopedResource {
        let id = self.register(handler);
        self.unregister_on_release(id)
    }

    /// Register under `key`; releasing the returned resource unregisters the
    /// handler.
    pub fn subscribe_for(
        self: &Arc<Self>,
        key: E::Key,
        handler: impl Fn(&Arc<S>, &E) -> Result<(), BoxError> + Send + Sync + 'static,
    ) -> ScopedResource {
        let id = self.register_for(key, handler);
        self.unregister_on_release(id)
    }

    fn unregister_on_release(self: &Arc<Self>, id: HandlerId) -> ScopedResource {
        let registry = Arc::downgrade(self);
        ScopedResource::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.unregister(id);
            }
        })
    }
}

impl<'a, S, E> IntoIterator for &'a KeyedHandlerRegistry<S, E>
where
    S: 'static,
    E: KeyedEvent + 'static,
{
    type Item = (E::Key, HandlerList<S, E>);
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.snapshot().into_iter()
    }
}

impl<S, E: KeyedEvent> fmt::Debug for KeyedHandlerRegistry<S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys = self
            .lists
            .lock()
            .map(|lists| lists.len())
            .unwrap_or_default();
        f.debug_struct("KeyedHandlerRegistry")
            .field("source_alive", &(self.source.strong_count() > 0))
            .field("keys", &keys)
            .field("catch_all", &self.catch_all)
            .finish()
    }
}

// -------------------------------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------------------------------
