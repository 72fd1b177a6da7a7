use std::any::Any;
use std::fmt;

/// Captures and re-attaches ambient per-borrow context.
///
/// Some callers want every resource handed out by the pool to carry whatever
/// logical-execution context (a tracing span, a cancellation token, a
/// request id) was live at the moment of the `acquire` that produced it, and
/// to have that context detached again on `release`/`destroy`. The pool
/// itself has no opinion on what that context is; it only guarantees to call
/// `attach` once per successful borrow and `detach` once per matching
/// release, in that order, with the exact token `attach` returned.
///
/// The default `NoopContextHook` makes this free for pools that don't need
/// it.
pub trait ContextHook: Send + Sync + 'static {
    /// Capture whatever ambient context should travel with this borrow.
    fn attach(&self) -> Box<dyn Any + Send>;

    /// Release context captured by a matching `attach`.
    fn detach(&self, token: Box<dyn Any + Send>);
}

impl fmt::Debug for dyn ContextHook {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("ContextHook")
    }
}

/// A `ContextHook` that captures and releases nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopContextHook;

impl ContextHook for NoopContextHook {
    fn attach(&self) -> Box<dyn Any + Send> {
        Box::new(())
    }

    fn detach(&self, _token: Box<dyn Any + Send>) {}
}
