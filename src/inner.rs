use std::cmp::min;
use std::mem;
use std::sync::Arc;
use std::time::Instant;

use futures::future::ok;
use futures::stream::FuturesUnordered;
use futures::TryStreamExt;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

use crate::builder::Builder;
use crate::context::ContextHook;
use crate::error::PoolError;
use crate::manager::Manager;
use crate::registry::{Conn, IdleConn, Registry};
use crate::state::PoolState;
use crate::waiter::WaiterQueue;

/// The pool data that must be protected by a lock. Owned collectively by
/// the Dispatcher; the Registry and Waiter Queue are its two constituent
/// parts.
pub(crate) struct PoolInternals<R, E>
where
    R: Send,
{
    pub(crate) registry: Registry<R>,
    pub(crate) waiters: WaiterQueue<R, E>,
    pub(crate) lifecycle: PoolState,
    pub(crate) reaper: Option<JoinHandle<()>>,
}

/// The guts of a `Pool`, shared via `Arc` across every clone.
pub(crate) struct SharedPool<M>
where
    M: Manager,
{
    pub(crate) statics: Builder<M>,
    pub(crate) manager: M,
    pub(crate) internals: Mutex<PoolInternals<M::Resource, M::Error>>,
    /// Fan-out notification for everyone awaiting `drain()` completion.
    /// A single `Notify` serves every concurrent `drain()` caller, which is
    /// how repeated/concurrent drains stay idempotent (§8: "idempotent
    /// drain").
    pub(crate) drain_notify: Notify,
    pub(crate) context_hook: Arc<dyn ContextHook>,
}

impl<M> SharedPool<M>
where
    M: Manager,
{
    pub(crate) fn sink(&self, error: M::Error) {
        let sink = self.statics.error_sink.boxed_clone();
        sink.sink(error);
    }

    /// True once every borrowed resource has been returned and the pool is
    /// at least draining.
    pub(crate) fn quiescent(internals: &PoolInternals<M::Resource, M::Error>) -> bool {
        internals.registry.borrowed_count() == 0
    }
}

/// Attempts to create one resource and hand it to whichever waiter is at
/// the head of the queue when it completes (never the one that triggered
/// it — by the time `create` resolves, the queue may have reshuffled; this
/// is the "always deferred" completion model from §4.1/§9: the caller of
/// `acquire` never learns the outcome of `create` until it has been fully
/// queued and this task has had a chance to run independently).
///
/// Per §4.4 step 2: on success the resource bypasses the idle queue
/// entirely if a waiter is present; on failure the head waiter receives
/// `PoolError::Create` and a further dispatch pass is scheduled.
pub(crate) async fn create_for_waiter<M>(shared: Arc<SharedPool<M>>)
where
    M: Manager,
{
    let result = shared.manager.create().await;
    let mut internals = shared.internals.lock().await;
    internals.registry.pending_conns -= 1;

    match result {
        Ok(resource) => {
            internals.registry.num_conns += 1;
            let birth = Instant::now();
            if let Some(waiter) = internals.waiters.dequeue() {
                drop(internals);
                let _ = waiter.tx.send(Ok(Conn { resource, birth }));
            } else {
                internals.registry.push_idle(IdleConn {
                    conn: Conn { resource, birth },
                    idle_since: birth,
                });
                drop(internals);
            }
        }
        Err(e) => {
            if let Some(waiter) = internals.waiters.dequeue() {
                drop(internals);
                let _ = waiter.tx.send(Err(PoolError::Create(e)));
            } else {
                drop(internals);
                shared.sink(e);
            }
        }
    }

    tokio::spawn(dispatch(shared));
}

/// Tears down one resource. `destroy` is infallible at the trait boundary
/// (§4.1: "its return value is ignored... must not fail observably"), so
/// there is nothing to propagate here.
pub(crate) fn spawn_discard<M>(shared: Arc<SharedPool<M>>, resource: M::Resource)
where
    M: Manager,
{
    tokio::spawn(async move {
        shared.manager.destroy(resource).await;
    });
}

/// Runs one dispatch pass to (local) completion: matches idle resources to
/// waiters (validating each before handoff, discarding and retrying on
/// failure), then spawns creation attempts for any waiters still unserved
/// while `count < max`. Creation itself is asynchronous, so this function
/// returns once it has spawned whatever background work is needed; the
/// spawned tasks re-invoke `dispatch` on completion to continue the pass.
pub(crate) async fn dispatch<M>(shared: Arc<SharedPool<M>>)
where
    M: Manager,
{
    loop {
        let mut internals = shared.internals.lock().await;
        if internals.lifecycle.is_drained() {
            return;
        }

        if internals.waiters.is_empty() {
            return;
        }

        if let Some(idle) = internals.registry.pop_warmest() {
            let mut resource = idle.conn.resource;
            if shared.manager.validate(&mut resource) {
                let birth = idle.conn.birth;
                let waiter = internals
                    .waiters
                    .dequeue()
                    .expect("checked non-empty above");
                drop(internals);
                let _ = waiter.tx.send(Ok(Conn { resource, birth }));
                continue;
            } else {
                internals.registry.num_conns -= 1;
                drop(internals);
                spawn_discard(shared.clone(), resource);
                continue;
            }
        }

        if internals.registry.num_conns + internals.registry.pending_conns
            < shared.statics.max_size
        {
            internals.registry.pending_conns += 1;
            drop(internals);
            tokio::spawn(create_for_waiter(shared.clone()));
            continue;
        }

        return;
    }
}

/// Creates resources directly into the idle queue (never touching a
/// waiter) to satisfy `min`. Used at pool construction (`Builder::build`)
/// and by the reaper's top-up step. Mirrors the teacher's
/// `replenish_idle_connections`: concurrent creation via
/// `FuturesUnordered`, folded down to the first error (if any) so `build`
/// can propagate it.
pub(crate) async fn replenish_idle<M>(shared: &Arc<SharedPool<M>>) -> Result<(), M::Error>
where
    M: Manager,
{
    let mut internals = shared.internals.lock().await;
    if !internals.lifecycle.is_accepting() {
        return Ok(());
    }
    let slots_available = shared
        .statics
        .max_size
        .saturating_sub(internals.registry.num_conns)
        .saturating_sub(internals.registry.pending_conns);
    let idle = internals.registry.available_count();
    let desired = shared.statics.min_idle;
    let to_create = min(desired.saturating_sub(idle), slots_available);
    internals.registry.pending_conns += to_create;
    mem::drop(internals);

    let stream = FuturesUnordered::new();
    for _ in 0..to_create {
        stream.push(create_for_idle(shared.clone()));
    }
    stream.try_fold((), |_, _| ok(())).await
}

async fn create_for_idle<M>(shared: Arc<SharedPool<M>>) -> Result<(), M::Error>
where
    M: Manager,
{
    match shared.manager.create().await {
        Ok(resource) => {
            let now = Instant::now();
            let mut internals = shared.internals.lock().await;
            internals.registry.pending_conns -= 1;
            internals.registry.num_conns += 1;
            if let Some(waiter) = internals.waiters.dequeue() {
                drop(internals);
                let _ = waiter.tx.send(Ok(Conn {
                    resource,
                    birth: now,
                }));
            } else {
                internals.registry.push_idle(IdleConn {
                    conn: Conn {
                        resource,
                        birth: now,
                    },
                    idle_since: now,
                });
            }
            Ok(())
        }
        Err(e) => {
            let mut internals = shared.internals.lock().await;
            internals.registry.pending_conns -= 1;
            Err(e)
        }
    }
}
