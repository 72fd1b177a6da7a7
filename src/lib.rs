//! A generic, tokio-based resource pool.
//!
//! This is an asynchronous connection-pool primitive in the spirit of bb8:
//! it amortises the construction cost of expensive, reusable objects
//! (database connections, sockets, worker handles — anything whose
//! creation dominates the cost of use) by maintaining a bounded cache of
//! live instances and mediating contention between callers that wish to
//! borrow them.
//!
//! cistern is agnostic to the resource type it manages. Implementors of
//! the [`Manager`] trait provide the resource-specific logic to create,
//! validate, and tear down resources; the pool supplies admission control,
//! a priority-banded waiter queue, idle-timeout reaping, and an explicit
//! drain/shutdown lifecycle.
//!
//! # Example
//!
//! Using an imaginary "foodb" resource.
//!
//! ```ignore
//! use cistern::{Manager, Pool};
//!
//! #[tokio::main]
//! async fn main() {
//!     let manager = foodb::FooManager::new("localhost:1234");
//!     let pool = Pool::builder().max_size(10).build(manager).await.unwrap();
//!
//!     for _ in 0..20 {
//!         let pool = pool.clone();
//!         tokio::spawn(async move {
//!             let conn = pool.get(0).await.unwrap();
//!             // use the resource
//!             // it is returned to the pool when it falls out of scope.
//!         });
//!     }
//! }
//! ```
#![deny(missing_docs, missing_debug_implementations)]

mod builder;
mod context;
mod decorator;
mod error;
mod inner;
mod lifecycle;
mod manager;
mod pool;
mod reaper;
mod registry;
mod state;
mod waiter;

pub use builder::Builder;
pub use context::{ContextHook, NoopContextHook};
pub use error::{ErrorSink, NopErrorSink, PoolError};
pub use manager::Manager;
pub use pool::{Pool, PooledResource};
pub use state::State;
