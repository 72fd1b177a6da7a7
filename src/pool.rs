use std::any::Any;
use std::fmt;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{oneshot, Mutex, Notify};
use tokio::time::timeout;

use crate::builder::Builder;
use crate::context::NoopContextHook;
use crate::error::PoolError;
use crate::inner::{dispatch, replenish_idle, PoolInternals, SharedPool};
use crate::manager::Manager;
use crate::registry::{Conn, Registry};
use crate::state::{PoolState, State};
use crate::waiter::WaiterQueue;

/// A generic, manager-agnostic resource pool.
///
/// Cheap to clone (an `Arc` bump); every clone shares the same underlying
/// pool. Dropping the last clone stops the reaper and leaves any
/// still-idle resources undestroyed — call [`Pool::destroy_all_now`] first
/// if resources must be torn down deterministically.
pub struct Pool<M>
where
    M: Manager,
{
    pub(crate) inner: Arc<SharedPool<M>>,
}

impl<M> Clone for Pool<M>
where
    M: Manager,
{
    fn clone(&self) -> Self {
        Pool {
            inner: self.inner.clone(),
        }
    }
}

impl<M> fmt::Debug for Pool<M>
where
    M: Manager,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_fmt(format_args!("Pool({:p})", self.inner))
    }
}

impl<M> Pool<M>
where
    M: Manager,
{
    pub(crate) fn new_inner(builder: Builder<M>, manager: M) -> Pool<M> {
        let priority_range = builder.priority_range;
        let internals = PoolInternals {
            registry: Registry::default(),
            waiters: WaiterQueue::new(priority_range),
            lifecycle: PoolState::Open,
            reaper: None,
        };

        let shared = Arc::new(SharedPool {
            statics: builder,
            manager,
            internals: Mutex::new(internals),
            drain_notify: Notify::new(),
            context_hook: Arc::new(NoopContextHook),
        });

        let handle = crate::reaper::spawn(Arc::downgrade(&shared));
        // Stash the handle; build() runs before anyone else can observe
        // `shared`, so a `try_lock` here cannot contend.
        if let Ok(mut internals) = shared.internals.try_lock() {
            internals.reaper = Some(handle);
        } else {
            handle.abort();
        }

        Pool { inner: shared }
    }

    pub(crate) async fn replenish_idle(&self) -> Result<(), M::Error> {
        replenish_idle(&self.inner).await
    }

    pub(crate) fn spawn_replenish_idle(self) {
        tokio::spawn(async move {
            if let Err(e) = replenish_idle(&self.inner).await {
                self.inner.sink(e);
            }
        });
    }

    /// Returns a [`Builder`] to configure a new pool.
    pub fn builder() -> Builder<M> {
        Builder::new()
    }

    /// Supplies a [`ContextHook`](crate::context::ContextHook) invoked
    /// around every borrow/release boundary. Must be called before the
    /// pool is shared across tasks, since it replaces the hook wholesale.
    pub fn set_context_hook(&mut self, hook: Arc<dyn crate::context::ContextHook>) {
        if let Some(shared) = Arc::get_mut(&mut self.inner) {
            shared.context_hook = hook;
        }
    }

    /// Returns a live snapshot of the pool's counters.
    pub async fn state(&self) -> State {
        let internals = self.inner.internals.lock().await;
        State::new(
            internals.registry.count(),
            internals.registry.available_count(),
            internals.waiters.len(),
        )
    }

    /// Total live resources (including ones mid-destroy).
    pub async fn count(&self) -> u32 {
        self.inner.internals.lock().await.registry.count()
    }

    /// Resources sitting idle right now.
    pub async fn available_count(&self) -> u32 {
        self.inner.internals.lock().await.registry.available_count()
    }

    /// Acquires currently parked in the waiter queue.
    pub async fn waiting_count(&self) -> u32 {
        self.inner.internals.lock().await.waiters.len()
    }

    /// The configured (post-clamp) floor.
    pub fn min(&self) -> u32 {
        self.inner.statics.min_idle
    }

    /// The configured ceiling.
    pub fn max(&self) -> u32 {
        self.inner.statics.max_size
    }

    /// Enqueues an acquire at the given priority band (clamped into
    /// `[0, priority_range)`) without waiting for it to resolve.
    ///
    /// Returns `true` when the caller can expect to be served promptly
    /// (there was an idle resource, or room to create one, *before* this
    /// waiter was counted against `max`); returns `false` when the caller
    /// should expect to wait — mirroring §4.4's `admitted` semantics
    /// exactly: the check is `count + waiters >= max` computed *after* the
    /// enqueue.
    pub async fn acquire(
        &self,
        priority: u32,
    ) -> (
        bool,
        impl Future<Output = Result<PooledResource<'_, M>, PoolError<M::Error>>> + '_,
    ) {
        let (tx, rx) = oneshot::channel();
        let mut internals = self.inner.internals.lock().await;

        if !internals.lifecycle.is_accepting() {
            let err = if internals.lifecycle.is_drained() {
                PoolError::Shutdown
            } else {
                PoolError::Drain
            };
            drop(internals);
            let _ = tx.send(Err(err));
            return (false, self.complete(rx));
        }

        internals.waiters.enqueue(priority, tx);
        let admitted =
            internals.registry.count() + internals.waiters.len() < self.inner.statics.max_size;
        drop(internals);

        tokio::spawn(dispatch(self.inner.clone()));
        (admitted, self.complete(rx))
    }

    async fn complete(
        &self,
        rx: oneshot::Receiver<Result<Conn<M::Resource>, PoolError<M::Error>>>,
    ) -> Result<PooledResource<'_, M>, PoolError<M::Error>> {
        let conn = match rx.await {
            Ok(inner) => inner?,
            Err(_canceled) => return Err(PoolError::Shutdown),
        };

        let token = self.inner.context_hook.attach();
        Ok(PooledResource {
            pool: self,
            checkout: Instant::now(),
            conn: Some(conn),
            context_token: Some(token),
        })
    }

    /// Acquires a resource, waiting up to `connection_timeout` (§9: a
    /// convenience layered on top of the core, not a core invariant) for a
    /// free slot to open up.
    pub async fn get(&self, priority: u32) -> Result<PooledResource<'_, M>, PoolError<M::Error>> {
        let (_admitted, completion) = self.acquire(priority).await;
        match timeout(self.inner.statics.connection_timeout, completion).await {
            Ok(result) => result,
            Err(_elapsed) => Err(PoolError::Shutdown),
        }
    }

    /// Returns a resource to the pool: marks it idle, stamps it with the
    /// current time, and triggers a dispatch pass.
    ///
    /// Callers normally never call this directly — letting a
    /// [`PooledResource`] drop does the same thing — but it's part of the
    /// public surface (§6) for callers that want to release deliberately
    /// ahead of scope end.
    pub async fn release(&self, mut conn: PooledResource<'_, M>) {
        if let Some(token) = conn.context_token.take() {
            self.inner.context_hook.detach(token);
        }
        let inner = conn.conn.take().expect("resource already taken");
        drop(conn);
        self.release_conn(inner).await;
    }

    pub(crate) async fn release_conn(&self, conn: Conn<M::Resource>) {
        let shared = self.inner.clone();
        let mut internals = shared.internals.lock().await;

        if !internals.lifecycle.is_accepting() {
            // §4.4 tie-break: once draining, `min` no longer applies (no
            // waiter will ever draw on this slot again) — discard instead
            // of re-idling it.
            internals.registry.num_conns = internals.registry.num_conns.saturating_sub(1);
            drop(internals);
            crate::inner::spawn_discard(shared.clone(), conn.resource);
            if SharedPool::<M>::quiescent(&shared.internals.lock().await) {
                shared.drain_notify.notify_waiters();
            }
            return;
        }

        internals
            .registry
            .push_idle(crate::registry::IdleConn::make_idle(conn));
        let quiescent = SharedPool::<M>::quiescent(&internals);
        let draining = !internals.lifecycle.is_accepting();
        drop(internals);

        if draining && quiescent {
            shared.drain_notify.notify_waiters();
        }
        tokio::spawn(dispatch(shared));
    }
}

/// A smart pointer wrapping a borrowed resource.
///
/// Releases the resource back to the pool on drop. This uses a blocking
/// inline executor to run the (lock-only, non-blocking) release logic
/// synchronously from `Drop`, exactly as the teacher does for the same
/// reason: `Drop` cannot `.await`, and the release path never performs I/O
/// of its own (creation/destruction happen in detached tasks), so driving
/// it with a throwaway single-future executor is sound and doesn't block
/// on anything the surrounding runtime owns.
pub struct PooledResource<'a, M>
where
    M: Manager,
{
    pool: &'a Pool<M>,
    checkout: Instant,
    conn: Option<Conn<M::Resource>>,
    context_token: Option<Box<dyn Any + Send>>,
}

impl<'a, M> PooledResource<'a, M>
where
    M: Manager,
{
    /// How long ago this resource was checked out.
    pub fn checked_out_for(&self) -> std::time::Duration {
        self.checkout.elapsed()
    }

    /// Consumes the guard and returns the bare resource, skipping release
    /// entirely. Used by [`Pool::destroy`], which takes ownership to
    /// discard the resource instead of re-idling it.
    pub(crate) fn into_resource(mut self) -> M::Resource {
        if let Some(token) = self.context_token.take() {
            self.pool.inner.context_hook.detach(token);
        }
        self.conn.take().expect("resource already taken").resource
    }
}

impl<'a, M> Deref for PooledResource<'a, M>
where
    M: Manager,
{
    type Target = M::Resource;

    fn deref(&self) -> &M::Resource {
        &self.conn.as_ref().expect("resource already taken").resource
    }
}

impl<'a, M> DerefMut for PooledResource<'a, M>
where
    M: Manager,
{
    fn deref_mut(&mut self) -> &mut M::Resource {
        &mut self.conn.as_mut().expect("resource already taken").resource
    }
}

impl<'a, M> fmt::Debug for PooledResource<'a, M>
where
    M: Manager,
    M::Resource: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(&self.conn.as_ref().expect("resource already taken").resource, f)
    }
}

impl<'a, M> Drop for PooledResource<'a, M>
where
    M: Manager,
{
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Some(token) = self.context_token.take() {
                self.pool.inner.context_hook.detach(token);
            }
            let pool = self.pool.clone();
            futures::executor::block_on(async move {
                pool.release_conn(conn).await;
            });
        }
    }
}
