use std::collections::VecDeque;

use tokio::sync::oneshot;

use crate::error::PoolError;
use crate::registry::Conn;

/// One pending `acquire`, parked until the dispatcher can satisfy it.
pub(crate) struct Waiter<R, E>
where
    R: Send,
{
    /// Monotonically increasing arrival index, carried for test assertions
    /// and debug output; ordering itself is already guaranteed by each
    /// band's `VecDeque`, so this is never consulted as a sort key.
    pub(crate) seq: u64,
    pub(crate) tx: oneshot::Sender<Result<Conn<R>, PoolError<E>>>,
}

/// A priority-banded FIFO queue of waiters.
///
/// Band 0 is highest priority. Within a band, `VecDeque` order is arrival
/// order, so dequeue is always "the oldest waiter in the lowest populated
/// band".
pub(crate) struct WaiterQueue<R, E>
where
    R: Send,
{
    bands: Vec<VecDeque<Waiter<R, E>>>,
    next_seq: u64,
}

impl<R, E> WaiterQueue<R, E>
where
    R: Send,
{
    pub(crate) fn new(priority_range: u32) -> Self {
        let priority_range = priority_range.max(1);
        WaiterQueue {
            bands: (0..priority_range).map(|_| VecDeque::new()).collect(),
            next_seq: 0,
        }
    }

    fn clamp(&self, priority: u32) -> usize {
        let max_band = self.bands.len().saturating_sub(1);
        (priority as usize).min(max_band)
    }

    /// Enqueue a waiter in the (clamped) given priority band. Returns the
    /// sequence number assigned, for cancellation.
    pub(crate) fn enqueue(
        &mut self,
        priority: u32,
        tx: oneshot::Sender<Result<Conn<R>, PoolError<E>>>,
    ) -> u64 {
        let band = self.clamp(priority);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.bands[band].push_back(Waiter { seq, tx });
        seq
    }

    /// Pop the highest-priority, oldest waiter, if any.
    pub(crate) fn dequeue(&mut self) -> Option<Waiter<R, E>> {
        for band in self.bands.iter_mut() {
            if let Some(waiter) = band.pop_front() {
                return Some(waiter);
            }
        }
        None
    }

    /// Total waiters across every band.
    pub(crate) fn len(&self) -> u32 {
        self.bands.iter().map(|b| b.len() as u32).sum()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return every waiter across every band, oldest-first
    /// within each band, highest-priority band first — used by `drain` to
    /// reject everyone still queued.
    pub(crate) fn drain_all(&mut self) -> Vec<Waiter<R, E>> {
        let mut drained = Vec::new();
        for band in self.bands.iter_mut() {
            drained.extend(band.drain(..));
        }
        drained
    }
}
