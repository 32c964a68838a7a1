/// Boxed error type returned by event handlers and release functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced by the handler registries, routers and disposal groups.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required argument was absent (for example a null `Weak` source).
    #[error("invalid argument: `{0}` is absent")]
    InvalidArgument(&'static str),

    /// A registered handler failed; the dispatch was aborted at that handler.
    #[error("event handler failed: {0}")]
    Handler(#[source] BoxError),

    /// One or more elements of a disposal group failed to release.
    ///
    /// Every element was still attempted and the collection was cleared.
    #[error("failed to release {failed} of {total} elements: {first}")]
    Release {
        /// Number of elements whose release returned an error.
        failed: usize,
        /// Number of elements the group held when it was disposed.
        total: usize,
        /// The first error, in iteration order.
        #[source]
        first: BoxError,
    },

    /// The default run-later fallback could not start its worker thread.
    #[error("failed to schedule deferred work: {0}")]
    Schedule(#[source] std::io::Error),
}
