//! Aggregate teardown of listener registrations and an owned collection.
//!
//! A [`ResourceGroup`] couples "stop listening" with "release everything that
//! was listened to". Disposal releases the registered listener handles first,
//! then releases every element (when the element type can be released), then
//! leaves the collection empty.
//!
//! # Failure policy
//!
//! Element release is best-effort: a failing element does not stop the
//! remaining ones. Every element is attempted, the collection ends up empty,
//! and the first failure is reported as [`Error::Release`] together with the
//! number of failures.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{BoxError, CompositeResource, Error, ScopedResource};

/// The capability to release a value explicitly.
pub trait Release {
    /// Run the value's cleanup logic.
    fn release(&mut self) -> Result<(), BoxError>;
}

impl Release for ScopedResource {
    fn release(&mut self) -> Result<(), BoxError> {
        self.dispose();
        Ok(())
    }
}

impl Release for Arc<ScopedResource> {
    fn release(&mut self) -> Result<(), BoxError> {
        self.dispose();
        Ok(())
    }
}

impl Release for CompositeResource {
    fn release(&mut self) -> Result<(), BoxError> {
        self.dispose();
        Ok(())
    }
}

impl<T: Release + ?Sized> Release for Box<T> {
    fn release(&mut self) -> Result<(), BoxError> {
        (**self).release()
    }
}

type ReleaseFn<T> = fn(&mut T) -> Result<(), BoxError>;

/// Owns a collection of `T` plus the listener registrations made for it.
///
/// Whether elements are released on disposal is decided once, at
/// construction: [`ResourceGroup::releasing`] captures `T`'s [`Release`]
/// implementation, [`ResourceGroup::new`] does not.
///
/// The collection is reached through [`lock`](ResourceGroup::lock); holding
/// that guard serializes the owner's reads and writes against disposal.
///
/// # Examples
///
/// ```rust
/// use stateful_core::{ResourceGroup, ScopedResource};
///
/// let group = ResourceGroup::releasing(vec![ScopedResource::empty(), ScopedResource::empty()]);
/// group.listeners().add(ScopedResource::new(|| println!("listener released")));
///
/// group.dispose().unwrap();
/// assert!(group.lock().is_empty());
/// assert!(group.listeners().is_empty());
/// ```
pub struct ResourceGroup<T> {
    items: Mutex<Vec<T>>,
    listeners: CompositeResource,
    release: Option<ReleaseFn<T>>,
    disposed: AtomicBool,
}

impl<T> ResourceGroup<T> {
    /// Take ownership of `items`; elements are dropped, not released, on disposal.
    pub fn new(items: Vec<T>) -> Self {
        Self::with_release(items, None)
    }

    fn with_release(items: Vec<T>, release: Option<ReleaseFn<T>>) -> Self {
        Self {
            items: Mutex::new(items),
            listeners: CompositeResource::new(),
            release,
            disposed: AtomicBool::new(false),
        }
    }

    /// Lock the owned collection.
    pub fn lock(&self) -> MutexGuard<'_, Vec<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The listener registrations released first on disposal.
    pub fn listeners(&self) -> &CompositeResource {
        &self.listeners
    }

    /// Whether elements are released on disposal.
    pub fn has_release_capability(&self) -> bool {
        self.release.is_some()
    }

    /// Whether [`dispose`](ResourceGroup::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Release listeners, then elements, and empty the collection. Idempotent.
    ///
    /// Elements are taken out of the collection under the lock and released
    /// after it is dropped, in insertion order.
    ///
    /// # Errors
    ///
    /// [`Error::Release`] if any element failed to release. Later calls
    /// return `Ok(())`.
    pub fn dispose(&self) -> Result<(), Error> {
        if self
            .disposed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }

        self.listeners.dispose();

        let mut items = std::mem::take(&mut *self.lock());
        let total = items.len();
        tracing::debug!(
            total,
            releasing = self.release.is_some(),
            "disposing resource group"
        );

        let Some(release) = self.release else {
            return Ok(());
        };

        let mut failed = 0;
        let mut first = None;
        for item in &mut items {
            if let Err(err) = release(item) {
                failed += 1;
                first.get_or_insert(err);
            }
        }
        drop(items);

        match first {
            Some(first) => Err(Error::Release {
                failed,
                total,
                first,
            }),
            None => Ok(()),
        }
    }
}

impl<T: Release> ResourceGroup<T> {
    /// Take ownership of `items`; each element is released on disposal.
    pub fn releasing(items: Vec<T>) -> Self {
        Self::with_release(items, Some(<T as Release>::release))
    }
}

impl<T> Drop for ResourceGroup<T> {
    fn drop(&mut self) {
        if let Err(err) = self.dispose() {
            tracing::warn!(error = %err, "resource group release failed during drop");
        }
    }
}

impl<T> fmt::Debug for ResourceGroup<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceGroup")
            .field("len", &self.lock().len())
            .field("listeners", &self.listeners)
            .field("releasing", &self.has_release_capability())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// -------------------------------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------------------------------
