//! Redirectable "run now" / "run later" marshaling.
//!
//! A [`SynchronizationRouter`] lets a consumer decide where work posted by the
//! observable layer actually runs: on a UI thread, in a test harness queue, or
//! (by default) inline for `run_now` and on a detached worker for `run_later`.

use std::fmt;
use std::sync::Arc;
use std::thread;

use crate::Error;

/// A unit of work handed to the router.
pub type Work = Box<dyn FnOnce() + Send + 'static>;

/// A callback that takes ownership of a unit of work and decides how to run it.
pub type Route = Arc<dyn Fn(Work) + Send + Sync + 'static>;

/// Routes synchronous and asynchronous work to optional callbacks.
///
/// # Examples
///
/// ```rust
/// use stateful_core::{SynchronizationRouter, Work};
/// use std::sync::{Arc, Mutex};
///
/// let queue: Arc<Mutex<Vec<Work>>> = Arc::default();
/// let pending = queue.clone();
/// let router = SynchronizationRouter::for_async(move |work| pending.lock().unwrap().push(work));
///
/// router.run_later(|| println!("deferred")).unwrap();
/// assert_eq!(queue.lock().unwrap().len(), 1);
///
/// // run_now has no callback, so it runs inline.
/// let ran = Arc::new(Mutex::new(false));
/// let flag = ran.clone();
/// router.run_now(move || *flag.lock().unwrap() = true);
/// assert!(*ran.lock().unwrap());
/// ```
#[derive(Clone, Default)]
pub struct SynchronizationRouter {
    run_now: Option<Route>,
    run_later: Option<Route>,
}

impl SynchronizationRouter {
    /// Create a router from optional callbacks.
    pub fn new(run_now: Option<Route>, run_later: Option<Route>) -> Self {
        Self { run_now, run_later }
    }

    /// Route only `run_now`; `run_later` uses the default fallback.
    pub fn for_sync(callback: impl Fn(Work) + Send + Sync + 'static) -> Self {
        Self::new(Some(Arc::new(callback)), None)
    }

    /// Route only `run_later`; `run_now` uses the default fallback.
    pub fn for_async(callback: impl Fn(Work) + Send + Sync + 'static) -> Self {
        Self::new(None, Some(Arc::new(callback)))
    }

    /// Replace the `run_now` callback.
    pub fn with_run_now(mut self, callback: impl Fn(Work) + Send + Sync + 'static) -> Self {
        self.run_now = Some(Arc::new(callback));
        self
    }

    /// Replace the `run_later` callback.
    pub fn with_run_later(mut self, callback: impl Fn(Work) + Send + Sync + 'static) -> Self {
        self.run_later = Some(Arc::new(callback));
        self
    }

    /// Run `work` synchronously.
    ///
    /// With a `run_now` callback the work is handed to it and this returns as
    /// soon as the callback does. Without one, `work` runs on the calling
    /// thread and has completed when this returns.
    pub fn run_now(&self, work: impl FnOnce() + Send + 'static) {
        match &self.run_now {
            Some(route) => {
                let work: Work = Box::new(work);
                route(work);
            }
            None => {
                tracing::trace!("run_now: no callback, running inline");
                work();
            }
        }
    }

    /// Run `work` later without blocking the caller.
    ///
    /// With a `run_later` callback the work is handed to it. Without one, the
    /// work runs on a detached worker thread.
    ///
    /// # Errors
    ///
    /// [`Error::Schedule`] if the fallback worker thread cannot be spawned.
    pub fn run_later(&self, work: impl FnOnce() + Send + 'static) -> Result<(), Error> {
        match &self.run_later {
            Some(route) => {
                let work: Work = Box::new(work);
                route(work);
                Ok(())
            }
            None => {
                tracing::trace!("run_later: no callback, spawning worker");
                thread::Builder::new()
                    .name("sync-router-post".to_string())
                    .spawn(work)
                    .map(drop)
                    .map_err(Error::Schedule)
            }
        }
    }

    /// Whether `run_now` is routed to a callback.
    pub fn routes_run_now(&self) -> bool {
        self.run_now.is_some()
    }

    /// Whether `run_later` is routed to a callback.
    pub fn routes_run_later(&self) -> bool {
        self.run_later.is_some()
    }
}

impl fmt::Debug for SynchronizationRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynchronizationRouter")
            .field("run_now", &self.routes_run_now())
            .field("run_later", &self.routes_run_later())
            .finish()
    }
}
