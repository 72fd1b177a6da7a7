use std::error;
use std::fmt;

/// cistern's error type.
///
/// Every kind is a distinct variant so callers can `match` on it instead of
/// inspecting a message string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolError<E> {
    /// The manager's `create` failed while trying to satisfy this acquire.
    /// Not fatal to the pool: later acquires may still succeed.
    Create(E),
    /// The pool has been drained (or is draining) and rejects new borrows.
    Drain,
    /// The pool was forcibly shut down via `destroy_all_now`.
    Shutdown,
}

impl<E> fmt::Display for PoolError<E>
where
    E: error::Error + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            PoolError::Create(ref err) => write!(f, "resource creation failed: {}", err),
            PoolError::Drain => write!(f, "pool is draining and accepts no new borrows"),
            PoolError::Shutdown => write!(f, "pool has been shut down"),
        }
    }
}

impl<E> error::Error for PoolError<E>
where
    E: error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            PoolError::Create(ref err) => Some(err),
            PoolError::Drain | PoolError::Shutdown => None,
        }
    }
}

/// A trait to receive errors generated by resource management that aren't
/// tied to any particular caller (e.g. a background top-up creation that has
/// no waiter to report to).
///
/// This is the pool's entire diagnostics surface: logging, metrics, and any
/// particular resource protocol are explicitly out of scope, but some seam
/// for surfacing failures that have no caller to hand them back to is not —
/// implementors plug in whatever logging/metrics stack they have.
pub trait ErrorSink<E>: fmt::Debug + Send + Sync + 'static {
    /// Receive an error.
    fn sink(&self, error: E);

    /// Clone this sink.
    fn boxed_clone(&self) -> Box<dyn ErrorSink<E>>;
}

/// An `ErrorSink` implementation that does nothing.
#[derive(Debug, Clone, Copy)]
pub struct NopErrorSink;

impl<E> ErrorSink<E> for NopErrorSink {
    fn sink(&self, _: E) {}

    fn boxed_clone(&self) -> Box<dyn ErrorSink<E>> {
        Box::new(*self)
    }
}
