use std::collections::VecDeque;
use std::time::Instant;

/// A live resource together with the instant it was created.
#[derive(Debug)]
pub struct Conn<R>
where
    R: Send,
{
    pub(crate) resource: R,
    pub(crate) birth: Instant,
}

/// A `Conn` that is currently idle, stamped with the instant it became so.
#[derive(Debug)]
pub struct IdleConn<R>
where
    R: Send,
{
    pub(crate) conn: Conn<R>,
    pub(crate) idle_since: Instant,
}

impl<R> IdleConn<R>
where
    R: Send,
{
    pub(crate) fn make_idle(conn: Conn<R>) -> IdleConn<R> {
        let now = Instant::now();
        IdleConn {
            conn,
            idle_since: now,
        }
    }
}

/// Tracks every live slot the pool currently owns, plus the counters that
/// the dispatcher and reaper use to enforce `min`/`max`.
///
/// This struct holds no lock of its own — it is the payload protected by the
/// single mutex in `inner::SharedPool`, kept as its own type so the counting
/// invariants (`borrowed + idle + creating <= max`) have one place where
/// they are asserted and exercised in isolation.
#[derive(Debug)]
pub struct Registry<R>
where
    R: Send,
{
    /// Idle resources, ordered oldest-idle-first (push to the tail on
    /// release, the Reaper scans from the head, the Dispatcher draws from
    /// the tail).
    pub(crate) idle: VecDeque<IdleConn<R>>,
    /// Total live resources, including ones currently being destroyed.
    pub(crate) num_conns: u32,
    /// Resources a creation attempt is currently in flight for.
    pub(crate) pending_conns: u32,
}

impl<R> Default for Registry<R>
where
    R: Send,
{
    fn default() -> Self {
        Registry {
            idle: VecDeque::new(),
            num_conns: 0,
            pending_conns: 0,
        }
    }
}

impl<R> Registry<R>
where
    R: Send,
{
    /// Total live resources, including those currently being destroyed but
    /// not yet removed from the count.
    pub fn count(&self) -> u32 {
        self.num_conns
    }

    /// Resources sitting idle, available for immediate handoff.
    pub fn available_count(&self) -> u32 {
        self.idle.len() as u32
    }

    /// Resources currently checked out by a caller.
    pub fn borrowed_count(&self) -> u32 {
        self.num_conns
            .saturating_sub(self.available_count())
            .saturating_sub(self.pending_conns)
    }

    /// Append a newly idle resource to the tail of the idle deque.
    pub(crate) fn push_idle(&mut self, conn: IdleConn<R>) {
        self.idle.push_back(conn);
    }

    /// Draw the warmest (most-recently-idled) resource, if any.
    pub(crate) fn pop_warmest(&mut self) -> Option<IdleConn<R>> {
        self.idle.pop_back()
    }

    /// Peek the coldest (longest-idle) resource without removing it.
    pub(crate) fn peek_coldest(&self) -> Option<&IdleConn<R>> {
        self.idle.front()
    }

    /// Remove the coldest resource; used by the reaper once it has decided
    /// the peeked entry is expired.
    pub(crate) fn pop_coldest(&mut self) -> Option<IdleConn<R>> {
        self.idle.pop_front()
    }
}
