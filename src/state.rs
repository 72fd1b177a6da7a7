use std::fmt;

/// Information about the current state of a `Pool`, as of the moment it was
/// read. Racy by construction (a snapshot under a lock that's immediately
/// released), exactly like every other live pool statistic.
pub struct State {
    /// The number of resources currently being managed by the pool,
    /// including ones currently mid-destroy.
    pub connections: u32,
    /// The number of idle resources.
    pub idle_connections: u32,
    /// The number of acquires currently parked in the waiter queue.
    pub waiting: u32,
    _p: (),
}

impl State {
    pub(crate) fn new(connections: u32, idle_connections: u32, waiting: u32) -> Self {
        State {
            connections,
            idle_connections,
            waiting,
            _p: (),
        }
    }
}

impl fmt::Debug for State {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("State")
            .field("connections", &self.connections)
            .field("idle_connections", &self.idle_connections)
            .field("waiting", &self.waiting)
            .finish()
    }
}

/// The pool's lifecycle phase.
///
/// `Open -> Draining -> Drained`, with `Open -> Drained` also permitted
/// directly via `destroy_all_now` (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PoolState {
    Open,
    Draining,
    Drained,
}

impl PoolState {
    pub(crate) fn is_accepting(&self) -> bool {
        matches!(self, PoolState::Open)
    }

    pub(crate) fn is_drained(&self) -> bool {
        matches!(self, PoolState::Drained)
    }
}
