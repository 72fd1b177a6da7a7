use async_trait::async_trait;

/// A trait which provides resource-specific functionality.
///
/// Implementors supply the domain-specific logic to create, destroy, and
/// (optionally) health-check resources; the pool supplies everything else —
/// admission, queueing, idle reaping, and shutdown.
#[async_trait]
pub trait Manager: Send + Sync + 'static {
    /// The resource type this manager deals with.
    type Resource: Send + 'static;
    /// The error type returned by resource creation.
    type Error: std::error::Error + Send + 'static;

    /// Attempts to create a new resource.
    ///
    /// Invoked with no pool lock held, so it may take as long as it needs.
    /// A failure here is never fatal to the pool: it is delivered only to
    /// the waiter currently at the head of the queue, and subsequent
    /// acquires may still succeed.
    async fn create(&self) -> Result<Self::Resource, Self::Error>;

    /// Takes ownership of a resource that is being removed from the pool
    /// (idle-reaped, invalidated, or force-destroyed) and disposes of it.
    ///
    /// Must not fail observably: if disposal can fail, the implementation
    /// should report that failure through its own side channel (the pool's
    /// `ErrorSink`, a metric, a log line) rather than propagating it, since
    /// there is no caller left to hand an error back to.
    async fn destroy(&self, resource: Self::Resource);

    /// Synchronously determines whether a resource is still usable.
    ///
    /// Called just before an idle resource is handed to a waiter. Defaults
    /// to "always valid" when a manager has no cheap validity check of its
    /// own, matching "optional `validate`, else true".
    fn validate(&self, _resource: &mut Self::Resource) -> bool {
        true
    }
}
