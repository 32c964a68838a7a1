//! Exactly-once release actions and composites of them.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

type ReleaseAction = Box<dyn FnOnce() + Send + 'static>;

/// Wraps a release action that runs at most once.
///
/// [`dispose`](ScopedResource::dispose) may be called any number of times
/// from any thread; an atomic compare-and-set on the released flag lets only
/// the first call through. Dropping an undisposed resource disposes it.
///
/// # Examples
///
/// ```rust
/// use stateful_core::ScopedResource;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let count = Arc::new(AtomicUsize::new(0));
/// let counter = count.clone();
/// let resource = ScopedResource::new(move || {
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
///
/// resource.dispose();
/// resource.dispose();
/// assert_eq!(count.load(Ordering::SeqCst), 1);
/// ```
pub struct ScopedResource {
    disposed: AtomicBool,
    action: Mutex<Option<ReleaseAction>>,
}

impl ScopedResource {
    /// Create a resource that runs `action` on first disposal.
    pub fn new(action: impl FnOnce() + Send + 'static) -> Self {
        Self {
            disposed: AtomicBool::new(false),
            action: Mutex::new(Some(Box::new(action))),
        }
    }

    /// A resource with nothing to release.
    pub fn empty() -> Self {
        Self {
            disposed: AtomicBool::new(false),
            action: Mutex::new(None),
        }
    }

    /// Run the release action if this is the first call.
    ///
    /// # Panics
    ///
    /// If the release action panics, the panic propagates to the caller. The
    /// resource is still considered disposed afterwards.
    pub fn dispose(&self) {
        if self
            .disposed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let action = self
            .action
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(action) = action {
            action();
        }
    }

    /// Whether [`dispose`](ScopedResource::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl Default for ScopedResource {
    fn default() -> Self {
        Self::empty()
    }
}

impl Drop for ScopedResource {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for ScopedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedResource")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// An ordered bag of [`ScopedResource`]s released together.
///
/// Resources are released in insertion order. Once the composite has been
/// disposed, any resource added to it is released immediately.
///
/// A resource may be shared as an `Arc<ScopedResource>` and disposed on its
/// own; the composite forgets disposed resources on the next `add`.
#[derive(Default)]
pub struct CompositeResource {
    disposed: AtomicBool,
    resources: Mutex<Vec<Arc<ScopedResource>>>,
}

impl CompositeResource {
    /// Create an empty composite.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource, or release it right away if the composite is disposed.
    pub fn add(&self, resource: impl Into<Arc<ScopedResource>>) {
        let resource = resource.into();
        {
            let mut resources = self
                .resources
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if !self.is_disposed() {
                resources.retain(|held| !held.is_disposed());
                resources.push(resource);
                return;
            }
        }
        resource.dispose();
    }

    /// Number of resources currently held.
    pub fn len(&self) -> usize {
        self.resources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no resources are currently held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether [`dispose`](CompositeResource::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Release every held resource in insertion order. Idempotent.
    ///
    /// The internal lock is released before any release action runs, so an
    /// action may add to or inspect this composite.
    pub fn dispose(&self) {
        let drained = {
            let mut resources = self
                .resources
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if self
                .disposed
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return;
            }
            std::mem::take(&mut *resources)
        };

        tracing::debug!(count = drained.len(), "disposing composite resource");
        for resource in drained {
            resource.dispose();
        }
    }
}

impl Drop for CompositeResource {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for CompositeResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeResource")
            .field("len", &self.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// -------------------------------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn counting(count: &Arc<AtomicUsize>) -> ScopedResource {
        let count = count.clone();
        ScopedResource::new(move || {
            count.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_dispose_runs_action_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let resource = counting(&count);

        assert!(!resource.is_disposed());
        resource.dispose();
        resource.dispose();
        resource.dispose();

        assert!(resource.is_disposed());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_disposes() {
        let count = Arc::new(AtomicUsize::new(0));
        drop(counting(&count));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_after_dispose_does_not_rerun() {
        let count = Arc::new(AtomicUsize::new(0));
        let resource = counting(&count);
        resource.dispose();
        drop(resource);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_empty_resource() {
        let resource = ScopedResource::empty();
        resource.dispose();
        assert!(resource.is_disposed());
    }

    #[test]
    fn test_concurrent_dispose_runs_once() {
        const THREADS: usize = 16;

        let count = Arc::new(AtomicUsize::new(0));
        let resource = Arc::new(counting(&count));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let resource = resource.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    resource.dispose();
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_composite_releases_in_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let composite = CompositeResource::new();

        for i in 0..3 {
            let order = order.clone();
            composite.add(ScopedResource::new(move || order.lock().unwrap().push(i)));
        }
        assert_eq!(composite.len(), 3);

        composite.dispose();
        assert!(composite.is_empty());
        assert!(composite.is_disposed());
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);

        composite.dispose();
        assert_eq!(order.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_composite_add_after_dispose_releases_immediately() {
        let count = Arc::new(AtomicUsize::new(0));
        let composite = CompositeResource::new();
        composite.dispose();

        composite.add(counting(&count));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(composite.is_empty());
    }

    #[test]
    fn test_composite_forgets_individually_disposed_resources() {
        let count = Arc::new(AtomicUsize::new(0));
        let composite = CompositeResource::new();
        let kept = Arc::new(counting(&count));
        composite.add(kept.clone());

        for _ in 0..100 {
            let subscription = Arc::new(counting(&count));
            composite.add(subscription.clone());
            subscription.dispose();
        }
        assert_eq!(count.load(Ordering::SeqCst), 100);
        assert_eq!(composite.len(), 2);

        composite.add(ScopedResource::empty());
        assert_eq!(composite.len(), 2);

        composite.dispose();
        assert!(kept.is_disposed());
        assert_eq!(count.load(Ordering::SeqCst), 101);
    }

    #[test]
    fn test_composite_action_may_reenter() {
        let composite = Arc::new(CompositeResource::new());
        let seen = Arc::new(AtomicUsize::new(usize::MAX));

        let inner = composite.clone();
        let seen_clone = seen.clone();
        composite.add(ScopedResource::new(move || {
            seen_clone.store(inner.len(), Ordering::SeqCst);
        }));

        composite.dispose();
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }
}
