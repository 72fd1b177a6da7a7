use std::time::Duration;

use crate::error::{ErrorSink, NopErrorSink};
use crate::manager::Manager;
use crate::pool::Pool;

/// Default reaper tick, per spec §3 (`reapIntervalMillis` default 1000ms).
const DEFAULT_REAP_INTERVAL: Duration = Duration::from_millis(1000);

/// A builder for a resource pool.
///
/// Fields map directly onto §3's Pool configuration, plus a handful the
/// teacher already separates out cleanly (`test_on_check_out`,
/// `max_lifetime`, `connection_timeout`) that this pool keeps for the same
/// reasons the teacher does.
pub struct Builder<M: Manager> {
    pub(crate) name: Option<String>,
    pub(crate) max_size: u32,
    pub(crate) min_idle: u32,
    pub(crate) test_on_check_out: bool,
    pub(crate) max_lifetime: Option<Duration>,
    pub(crate) idle_timeout: Duration,
    pub(crate) connection_timeout: Duration,
    pub(crate) priority_range: u32,
    pub(crate) refresh_idle: bool,
    pub(crate) error_sink: Box<dyn ErrorSink<M::Error>>,
    pub(crate) reap_interval: Duration,
    _marker: std::marker::PhantomData<M>,
}

impl<M: Manager> std::fmt::Debug for Builder<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("name", &self.name)
            .field("max_size", &self.max_size)
            .field("min_idle", &self.min_idle)
            .field("test_on_check_out", &self.test_on_check_out)
            .field("max_lifetime", &self.max_lifetime)
            .field("idle_timeout", &self.idle_timeout)
            .field("connection_timeout", &self.connection_timeout)
            .field("priority_range", &self.priority_range)
            .field("refresh_idle", &self.refresh_idle)
            .field("reap_interval", &self.reap_interval)
            .finish()
    }
}

impl<M: Manager> Default for Builder<M> {
    fn default() -> Self {
        Builder {
            name: None,
            // §3 invariant 3: malformed config silently defaults to min=0, max=1.
            max_size: 1,
            min_idle: 0,
            test_on_check_out: true,
            max_lifetime: None,
            idle_timeout: Duration::from_secs(10 * 60),
            connection_timeout: Duration::from_secs(30),
            priority_range: 1,
            refresh_idle: true,
            error_sink: Box::new(NopErrorSink),
            reap_interval: DEFAULT_REAP_INTERVAL,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<M: Manager> Builder<M> {
    /// Constructs a new `Builder` with every field at its spec default.
    pub fn new() -> Builder<M> {
        Default::default()
    }

    /// Sets the pool's opaque label, used only for introspection/debugging.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the hard ceiling on live resources (`max`, §3). Must be >= 1;
    /// non-finite/zero input is not representable in `u32` so this is
    /// enforced by the type itself rather than a runtime clamp.
    pub fn max_size(mut self, max_size: u32) -> Self {
        assert!(max_size > 0, "max_size must be greater than zero");
        self.max_size = max_size;
        self
    }

    /// Sets the target number of resources to keep live even when idle
    /// (`min`, §3). Clamped against `max_size` at `build()` time per
    /// invariant 2.
    pub fn min_idle(mut self, min_idle: u32) -> Self {
        self.min_idle = min_idle;
        self
    }

    /// If true (the default), a resource is validated via
    /// `Manager::validate` before being handed to a waiter.
    pub fn test_on_check_out(mut self, test_on_check_out: bool) -> Self {
        self.test_on_check_out = test_on_check_out;
        self
    }

    /// Sets the maximum lifetime of a resource. If set, the reaper destroys
    /// a resource at the next tick after it has lived this long, whether
    /// idle or not (checked when it next becomes idle).
    pub fn max_lifetime(mut self, max_lifetime: Option<Duration>) -> Self {
        assert!(
            max_lifetime != Some(Duration::from_secs(0)),
            "max_lifetime must be greater than zero"
        );
        self.max_lifetime = max_lifetime;
        self
    }

    /// Sets `idleTimeoutMillis` (§3): the eviction threshold.
    pub fn idle_timeout(mut self, idle_timeout: Duration) -> Self {
        assert!(
            idle_timeout > Duration::from_secs(0),
            "idle_timeout must be greater than zero"
        );
        self.idle_timeout = idle_timeout;
        self
    }

    /// Sets how long `Pool::get` will wait for a resource before giving up.
    /// Not a core-invariant timeout (§5: "timeouts are not applied to
    /// acquires in the core") — a convenience layered on top, as in the
    /// teacher.
    pub fn connection_timeout(mut self, connection_timeout: Duration) -> Self {
        assert!(
            connection_timeout > Duration::from_secs(0),
            "connection_timeout must be non-zero"
        );
        self.connection_timeout = connection_timeout;
        self
    }

    /// Sets `priorityRange` (§3): the number of priority bands. Defaults to
    /// 1 (no effective prioritization).
    pub fn priority_range(mut self, priority_range: u32) -> Self {
        self.priority_range = priority_range.max(1);
        self
    }

    /// Sets `refreshIdle` (§3): whether idle reaping evicts expired
    /// resources. The reaper's `min` top-up always runs regardless.
    pub fn refresh_idle(mut self, refresh_idle: bool) -> Self {
        self.refresh_idle = refresh_idle;
        self
    }

    /// Sets the sink for errors not associated with any particular caller
    /// (background top-up failures, swallowed destroy errors).
    pub fn error_sink(mut self, error_sink: Box<dyn ErrorSink<M::Error>>) -> Self {
        self.error_sink = error_sink;
        self
    }

    /// Sets `reapIntervalMillis` (§3, default 1000ms): the reaper tick.
    pub fn reap_interval(mut self, reap_interval: Duration) -> Self {
        assert!(
            reap_interval > Duration::from_secs(0),
            "reap_interval must be non-zero"
        );
        self.reap_interval = reap_interval;
        self
    }

    fn clamp_and_build(mut self, manager: M) -> Pool<M> {
        // Invariant 2: min <= max; if min > max, both clamp to max.
        if self.min_idle > self.max_size {
            self.min_idle = self.max_size;
        }
        Pool::new_inner(self, manager)
    }

    /// Consumes the builder, returning a new, initialized `Pool`.
    ///
    /// The pool will not be returned until it has established its
    /// configured minimum number of resources, or resource creation fails.
    pub async fn build(self, manager: M) -> Result<Pool<M>, M::Error> {
        let pool = self.clamp_and_build(manager);
        pool.replenish_idle().await.map(|()| pool)
    }

    /// Consumes the builder, returning a new, initialized `Pool`.
    ///
    /// Unlike `build`, this does not wait for any resources to be
    /// established before returning; the `min` top-up happens in the
    /// background.
    pub fn build_unchecked(self, manager: M) -> Pool<M> {
        let pool = self.clamp_and_build(manager);
        pool.clone().spawn_replenish_idle();
        pool
    }
}
