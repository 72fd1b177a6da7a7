use std::sync::Weak;
use std::time::Instant;

use tokio::task::JoinHandle;
use tokio::time::interval_at;

use crate::inner::{replenish_idle, spawn_discard, SharedPool};
use crate::manager::Manager;
use crate::state::PoolState;

/// Spawns the background reaper task for a freshly constructed pool,
/// holding only a `Weak` reference so a dropped `Pool` (with nobody having
/// called `destroy_all_now`) lets this task observe the upgrade failing and
/// exit promptly, per §9's "cyclic timers must be cancellable... lets the
/// process exit promptly".
pub(crate) fn spawn<M>(weak_shared: Weak<SharedPool<M>>) -> JoinHandle<()>
where
    M: Manager,
{
    let reap_interval = match weak_shared.upgrade() {
        Some(shared) => shared.statics.reap_interval,
        None => return tokio::spawn(async {}),
    };

    tokio::spawn(async move {
        let mut ticker = interval_at((Instant::now() + reap_interval).into(), reap_interval);
        loop {
            ticker.tick().await;
            let shared = match weak_shared.upgrade() {
                Some(shared) => shared,
                None => break,
            };
            tick(&shared).await;
        }
    })
}

/// One reaper tick (§4.5):
///
/// 1. scan the idle deque from the head (oldest first — it's sorted by
///    construction, so this can stop at the first unexpired entry);
/// 2. evict any entry whose idle time has exceeded `idle_timeout`,
///    provided doing so would not take the live count below `min`;
/// 3. top up if the live count is below `min` and the pool isn't
///    draining/drained.
async fn tick<M>(shared: &std::sync::Arc<SharedPool<M>>)
where
    M: Manager,
{
    let mut expired = Vec::new();
    {
        let mut internals = shared.internals.lock().await;

        if shared.statics.refresh_idle {
            let now = Instant::now();
            loop {
                let should_evict = match internals.registry.peek_coldest() {
                    Some(idle) => {
                        now.duration_since(idle.idle_since) >= shared.statics.idle_timeout
                            && internals.registry.count() > shared.statics.min_idle
                    }
                    None => false,
                };
                if !should_evict {
                    break;
                }
                let idle = internals
                    .registry
                    .pop_coldest()
                    .expect("checked Some above");
                internals.registry.num_conns = internals.registry.num_conns.saturating_sub(1);
                expired.push(idle.conn.resource);
            }

            // Lifetime eviction: resources that outlived `max_lifetime`,
            // whether or not they've hit the idle threshold yet. Scanned
            // separately since the idle deque is sorted by idle time, not
            // birth time.
            if let Some(max_lifetime) = shared.statics.max_lifetime {
                let mut keep = std::collections::VecDeque::new();
                while let Some(idle) = internals.registry.idle.pop_front() {
                    if now.duration_since(idle.conn.birth) >= max_lifetime
                        && internals.registry.num_conns > shared.statics.min_idle
                    {
                        internals.registry.num_conns =
                            internals.registry.num_conns.saturating_sub(1);
                        expired.push(idle.conn.resource);
                    } else {
                        keep.push_back(idle);
                    }
                }
                internals.registry.idle = keep;
            }
        }
    }

    for resource in expired {
        spawn_discard(shared.clone(), resource);
    }

    let needs_top_up = {
        let internals = shared.internals.lock().await;
        internals.lifecycle == PoolState::Open
            && internals.registry.num_conns + internals.registry.pending_conns
                < shared.statics.min_idle
    };
    if needs_top_up {
        if let Err(e) = replenish_idle(shared).await {
            shared.sink(e);
        }
    }
}
