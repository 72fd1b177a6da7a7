use std::sync::Arc;

use crate::error::PoolError;
use crate::inner::{spawn_discard, SharedPool};
use crate::manager::Manager;
use crate::pool::Pool;
use crate::state::PoolState;

impl<M> Pool<M>
where
    M: Manager,
{
    /// Transitions the pool to *draining*: new acquires are rejected with
    /// [`PoolError::Drain`], and every waiter already queued is rejected
    /// the same way (§5: "Drain cancels all then-waiting waiters with a
    /// drain error"). Resolves once every currently-*borrowed* resource has
    /// been released.
    ///
    /// Idempotent: concurrent or repeated calls share one completion
    /// signal (a single `Notify`), so every caller's future resolves
    /// exactly once, whichever `drain()` call first reached quiescence.
    pub async fn drain(&self) {
        let shared = self.inner.clone();
        let idle = {
            let mut internals = shared.internals.lock().await;
            let mut idle = Vec::new();
            if internals.lifecycle == PoolState::Open {
                internals.lifecycle = PoolState::Draining;
                let rejected = internals.waiters.drain_all();
                for waiter in rejected {
                    let _ = waiter.tx.send(Err(PoolError::Drain));
                }
                // Idle resources serve no further purpose once draining —
                // nothing will ever be handed them again — so they are
                // reaped immediately rather than left for the reaper or
                // held against `min` (§8 scenario 2: `availableCount` is 0
                // once `drain` resolves).
                while let Some(conn) = internals.registry.pop_coldest() {
                    internals.registry.num_conns =
                        internals.registry.num_conns.saturating_sub(1);
                    idle.push(conn.conn.resource);
                }
            }
            idle
        };
        // Awaited, not `spawn_discard`'d: §8 scenario 2 treats "exactly 1
        // destroy" as a synchronous postcondition of `drain` itself, so the
        // corresponding `Manager::destroy` calls must have returned before
        // this function does, matching `destroy_all_now`'s own handling of
        // its idle flush below.
        let mut discards: Vec<_> = idle
            .into_iter()
            .map(|resource| async { shared.manager.destroy(resource).await })
            .collect::<Vec<_>>();
        while let Some(fut) = discards.pop() {
            fut.await;
        }
        {
            let internals = shared.internals.lock().await;
            if SharedPool::<M>::quiescent(&internals) {
                return;
            }
        }

        loop {
            let notified = shared.drain_notify.notified();
            {
                let internals = shared.internals.lock().await;
                if internals.lifecycle.is_drained() || SharedPool::<M>::quiescent(&internals) {
                    return;
                }
            }
            notified.await;
            let internals = shared.internals.lock().await;
            if internals.lifecycle.is_drained() || SharedPool::<M>::quiescent(&internals) {
                return;
            }
        }
    }

    /// Forcibly terminates the pool: transitions to *drained*, cancels the
    /// reaper, discards every slot (including idle ones still pending
    /// reap), and fails every outstanding waiter with
    /// [`PoolError::Shutdown`]. Resolves once every `Manager::destroy` call
    /// has returned.
    ///
    /// `Open -> Drained` directly is permitted, as is calling this after
    /// (or during) `drain()`.
    pub async fn destroy_all_now(&self) {
        let shared = self.inner.clone();
        let (idle, reaper) = {
            let mut internals = shared.internals.lock().await;
            internals.lifecycle = PoolState::Drained;

            let rejected = internals.waiters.drain_all();
            for waiter in rejected {
                let _ = waiter.tx.send(Err(PoolError::Shutdown));
            }

            let mut idle = Vec::new();
            while let Some(conn) = internals.registry.pop_coldest() {
                idle.push(conn.conn.resource);
            }
            internals.registry.num_conns = 0;
            internals.registry.pending_conns = 0;

            (idle, internals.reaper.take())
        };

        if let Some(handle) = reaper {
            handle.abort();
        }

        let mut discards: Vec<_> = idle
            .into_iter()
            .map(|resource| async {
                shared.manager.destroy(resource).await;
            })
            .collect::<Vec<_>>();
        while let Some(fut) = discards.pop() {
            fut.await;
        }

        shared.drain_notify.notify_waiters();
    }

    /// Forcibly removes one resource from the pool: transitions its slot
    /// to *destroying*, removes it from the idle deque if present, and
    /// schedules disposal. Triggers a dispatch pass so `min` can be
    /// refilled.
    pub async fn destroy(&self, conn: crate::pool::PooledResource<'_, M>) {
        let shared = self.inner.clone();
        let resource = conn.into_resource();
        let (draining, quiescent) = {
            let mut internals = shared.internals.lock().await;
            internals.registry.num_conns = internals.registry.num_conns.saturating_sub(1);
            (
                !internals.lifecycle.is_accepting(),
                SharedPool::<M>::quiescent(&internals),
            )
        };
        spawn_discard(shared.clone(), resource);
        if draining && quiescent {
            shared.drain_notify.notify_waiters();
        }
        maybe_top_up(&shared).await;
        tokio::spawn(crate::inner::dispatch(shared));
    }
}

/// After an explicit `destroy` (or any other count-reducing event outside
/// the reaper's own tick), check whether the live count has fallen below
/// `min` and, if so, kick off a background top-up — the same replenishment
/// path the reaper uses, reused here per §4.4's "triggers a dispatch pass
/// (to possibly replace it via min)".
pub(crate) async fn maybe_top_up<M>(shared: &Arc<SharedPool<M>>)
where
    M: Manager,
{
    let should_top_up = {
        let internals = shared.internals.lock().await;
        internals.lifecycle == PoolState::Open
            && internals.registry.num_conns + internals.registry.pending_conns
                < shared.statics.min_idle
    };
    if should_top_up {
        let s = shared.clone();
        tokio::spawn(async move {
            if let Err(e) = crate::inner::replenish_idle(&s).await {
                s.sink(e);
            }
        });
    }
}
