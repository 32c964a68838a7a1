#![forbid(unsafe_code)]

//! # Stateful Core
//!
//! Thread-safe plumbing for observable objects.
//!
//! The crate provides keyed event handler registries that observe their source
//! through a weak reference, release actions that run exactly once, and a
//! disposal group that tears down listener registrations together with the
//! collection they were made for.
//!
//! ## Quick Start
//!
//! ```rust
//! use stateful_core::{PropertyChanged, PropertyHandlerRegistry, ResourceGroup};
//! use std::sync::{Arc, Mutex};
//!
//! struct Counter {
//!     value: Mutex<u32>,
//! }
//!
//! let counter = Arc::new(Counter { value: Mutex::new(0) });
//! let changes = Arc::new(PropertyHandlerRegistry::new(&counter));
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let log = seen.clone();
//! let subscription = changes.subscribe_for("value".into(), move |source: &Arc<Counter>, _| {
//!     log.lock().unwrap().push(*source.value.lock().unwrap());
//!     Ok(())
//! });
//!
//! // Tie the subscription's lifetime to a group.
//! let group: ResourceGroup<u32> = ResourceGroup::new(Vec::new());
//! group.listeners().add(subscription);
//!
//! *counter.value.lock().unwrap() = 1;
//! changes.dispatch(&PropertyChanged::new("value")).unwrap();
//!
//! group.dispose().unwrap();
//! changes.dispatch(&PropertyChanged::new("value")).unwrap(); // nobody listening
//!
//! assert_eq!(*seen.lock().unwrap(), vec![1]);
//! ```
//!
//! ## Features
//!
//! - **Weak sources**: a registry never keeps its source alive; dispatch after
//!   the source is gone is a silent no-op
//! - **Per-key locking**: each key has its own handler list and guard, so slow
//!   handlers on one key do not block another
//! - **Re-entrant handlers**: list guards are reentrant, so a handler may
//!   register, unregister or dispatch on the same registry
//! - **Deterministic order**: keyed handlers in registration order, then
//!   catch-all handlers in registration order
//! - **Exactly-once release**: [`ScopedResource`] gates its action with an
//!   atomic flag
//! - **Tracing support**: `tracing` events plus an optional per-registry
//!   callback
//!
//! ## Main Types
//!
//! - [`KeyedHandlerRegistry`] - generic keyed registry, with the
//!   [`CollectionHandlerRegistry`] and [`PropertyHandlerRegistry`] instantiations
//! - [`ScopedResource`] / [`CompositeResource`] - release actions
//! - [`ResourceGroup`] - aggregate disposal of listeners and owned elements
//! - [`SynchronizationRouter`] - redirectable run-now / run-later marshaling

mod collection;
mod error;
mod keyed_event;
mod property;
mod registry;
mod registry_event;
mod resource_group;
mod scoped;
mod sync_router;

pub use collection::{CollectionAction, CollectionChanged, CollectionHandlerRegistry};
pub use error::{BoxError, Error};
pub use keyed_event::KeyedEvent;
pub use property::{PropertyChanged, PropertyHandlerRegistry};
pub use registry::{Handler, HandlerId, HandlerList, KeyedHandlerRegistry, TraceCallback};
pub use registry_event::RegistryEvent;
pub use resource_group::{Release, ResourceGroup};
pub use scoped::{CompositeResource, ScopedResource};
pub use sync_router::{Route, SynchronizationRouter, Work};
