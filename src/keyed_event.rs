//! Core trait describing how an event is routed.
//!
//! A [`KeyedHandlerRegistry`](crate::KeyedHandlerRegistry) is generic over the
//! event it dispatches. The event type decides which key it carries and which
//! keys are aliases for the catch-all channel; the registry does the rest.

use std::fmt::Debug;
use std::hash::Hash;

/// An event that can be routed to a keyed handler list.
///
/// Only [`key`](KeyedEvent::key) has to be implemented. Events without a key
/// (or whose key is a catch-all alias) reach the catch-all handlers only.
pub trait KeyedEvent {
    /// The discriminator handler lists are stored under.
    type Key: Eq + Hash + Clone + Debug;

    /// The key this event is routed by, if any.
    fn key(&self) -> Option<&Self::Key>;

    /// Whether `key` names the catch-all channel rather than a dedicated list.
    ///
    /// Registering under such a key appends to the catch-all list, and
    /// dispatching an event carrying it skips the keyed tier. No key is a
    /// catch-all alias by default.
    fn is_catch_all_key(key: &Self::Key) -> bool {
        let _ = key;
        false
    }

    /// The key to look up in the keyed tier, with catch-all aliases removed.
    fn routing_key(&self) -> Option<&Self::Key> {
        self.key().filter(|key| !Self::is_catch_all_key(key))
    }
}
