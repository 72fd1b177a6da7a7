use std::future::Future;

use crate::error::PoolError;
use crate::manager::Manager;
use crate::pool::Pool;

impl<M> Pool<M>
where
    M: Manager,
{
    /// Wraps a user async closure so that acquire/release bracket it
    /// transparently (§4.7, the Borrow Decorator).
    ///
    /// Acquires a resource at the given priority, invokes `f` with a
    /// mutable borrow of it, releases the resource once `f`'s future
    /// resolves (or if it panics — the release happens via
    /// [`PooledResource`](crate::pool::PooledResource)'s `Drop`, so it runs
    /// regardless), and forwards `f`'s output to the caller. If `acquire`
    /// itself fails, the error is returned directly and `f` is never
    /// invoked.
    pub async fn with<F, Fut, T>(&self, priority: u32, f: F) -> Result<T, PoolError<M::Error>>
    where
        F: FnOnce(&mut M::Resource) -> Fut,
        Fut: Future<Output = T>,
    {
        let mut conn = self.get(priority).await?;
        Ok(f(&mut conn).await)
    }
}
