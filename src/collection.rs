//! Collection-change events keyed by the closed set of change kinds.

use std::fmt;

use crate::{KeyedEvent, KeyedHandlerRegistry};

/// What happened to a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CollectionAction {
    /// Items were inserted.
    Add,
    /// Items were removed.
    Remove,
    /// Items were replaced in place.
    Replace,
    /// Items changed position.
    Move,
    /// The collection changed wholesale (for example it was cleared).
    Reset,
}

impl CollectionAction {
    /// Every action, in declaration order.
    pub const ALL: [CollectionAction; 5] = [
        CollectionAction::Add,
        CollectionAction::Remove,
        CollectionAction::Replace,
        CollectionAction::Move,
        CollectionAction::Reset,
    ];
}

impl fmt::Display for CollectionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CollectionAction::Add => "add",
            CollectionAction::Remove => "remove",
            CollectionAction::Replace => "replace",
            CollectionAction::Move => "move",
            CollectionAction::Reset => "reset",
        };
        f.write_str(name)
    }
}

/// A change to a collection of `T`.
///
/// Indices are positions in the collection at the time of the change;
/// `None` means the position is unknown or not applicable.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionChanged<T> {
    /// The kind of change; this is the routing key.
    pub action: CollectionAction,
    /// Items added or moved (the new values for `Replace`).
    pub new_items: Vec<T>,
    /// Items removed or moved (the old values for `Replace`).
    pub old_items: Vec<T>,
    /// Where `new_items` start.
    pub new_index: Option<usize>,
    /// Where `old_items` started.
    pub old_index: Option<usize>,
}

impl<T> CollectionChanged<T> {
    fn new(action: CollectionAction) -> Self {
        Self {
            action,
            new_items: Vec::new(),
            old_items: Vec::new(),
            new_index: None,
            old_index: None,
        }
    }

    /// `items` were inserted at `index`.
    pub fn added(items: Vec<T>, index: usize) -> Self {
        Self {
            new_items: items,
            new_index: Some(index),
            ..Self::new(CollectionAction::Add)
        }
    }

    /// `items` were removed from `index`.
    pub fn removed(items: Vec<T>, index: usize) -> Self {
        Self {
            old_items: items,
            old_index: Some(index),
            ..Self::new(CollectionAction::Remove)
        }
    }

    /// `old` at `index` was replaced by `new`.
    pub fn replaced(new: Vec<T>, old: Vec<T>, index: usize) -> Self {
        Self {
            new_items: new,
            old_items: old,
            new_index: Some(index),
            old_index: Some(index),
            ..Self::new(CollectionAction::Replace)
        }
    }

    /// `items` moved from `from` to `to`.
    pub fn moved(items: Vec<T>, from: usize, to: usize) -> Self
    where
        T: Clone,
    {
        Self {
            new_items: items.clone(),
            old_items: items,
            new_index: Some(to),
            old_index: Some(from),
            ..Self::new(CollectionAction::Move)
        }
    }

    /// The collection changed dramatically; observers should re-read it.
    pub fn reset() -> Self {
        Self::new(CollectionAction::Reset)
    }
}

impl<T> KeyedEvent for CollectionChanged<T> {
    type Key = CollectionAction;

    fn key(&self) -> Option<&Self::Key> {
        Some(&self.action)
    }
}

/// Registry dispatching [`CollectionChanged`] events by [`CollectionAction`].
pub type CollectionHandlerRegistry<S, T> = KeyedHandlerRegistry<S, CollectionChanged<T>>;
