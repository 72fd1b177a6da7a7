//! Quantified invariants from §8, each as its own focused test against the
//! same counting mock used in `pool_scenarios.rs`. These complement the six
//! end-to-end scenarios with direct checks of the properties the scenarios
//! only exercise indirectly.

use std::collections::HashSet;
use std::error;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cistern::{Manager, Pool};
use futures::future::join_all;

#[derive(Debug)]
struct CreateFailed;

impl fmt::Display for CreateFailed {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "create failed")
    }
}

impl error::Error for CreateFailed {}

#[derive(Debug)]
struct Resource {
    id: u32,
}

struct CountingManager {
    next_id: AtomicU32,
    creates: Arc<AtomicU32>,
    destroys: Arc<AtomicU32>,
}

impl CountingManager {
    fn new() -> (Self, Arc<AtomicU32>, Arc<AtomicU32>) {
        let creates = Arc::new(AtomicU32::new(0));
        let destroys = Arc::new(AtomicU32::new(0));
        (
            CountingManager {
                next_id: AtomicU32::new(0),
                creates: creates.clone(),
                destroys: destroys.clone(),
            },
            creates,
            destroys,
        )
    }
}

#[async_trait]
impl Manager for CountingManager {
    type Resource = Resource;
    type Error = CreateFailed;

    async fn create(&self) -> Result<Resource, CreateFailed> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(Resource { id })
    }

    async fn destroy(&self, _resource: Resource) {
        self.destroys.fetch_add(1, Ordering::SeqCst);
    }
}

/// Bounded live set: `count <= max` holds at every point we sample it,
/// across a burst of contending acquires well beyond `max`.
#[tokio::test]
async fn bounded_live_set() {
    let (manager, _creates, _destroys) = CountingManager::new();
    let pool = Pool::builder()
        .max_size(3)
        .idle_timeout(Duration::from_secs(60))
        .build(manager)
        .await
        .unwrap();

    let mut completions = Vec::new();
    for _ in 0..25 {
        let (_admitted, completion) = pool.acquire(0).await;
        completions.push(completion);
        assert!(
            pool.count().await <= 3,
            "count must never exceed max even mid-expansion"
        );
    }

    join_all(completions.into_iter().map(|completion| async move {
        let conn = completion.await.expect("acquire should succeed");
        assert!(pool.count().await <= 3);
        drop(conn);
    }))
    .await;

    assert!(pool.count().await <= 3);
}

/// After `destroy_all_now`, the live count drops to zero and the reaper
/// stops ticking (observable as: no further destroys after the ones
/// `destroy_all_now` itself issues, even past several reap intervals).
#[tokio::test]
async fn shutdown_drives_count_to_zero_and_stops_reaping() {
    let (manager, _creates, destroys) = CountingManager::new();
    let pool = Pool::builder()
        .min_idle(2)
        .max_size(4)
        .idle_timeout(Duration::from_secs(60))
        .reap_interval(Duration::from_millis(10))
        .build(manager)
        .await
        .unwrap();

    assert_eq!(pool.count().await, 2);

    pool.destroy_all_now().await;

    assert_eq!(pool.count().await, 0);
    assert_eq!(pool.available_count().await, 0);
    let destroyed_at_shutdown = destroys.load(Ordering::SeqCst);
    assert_eq!(destroyed_at_shutdown, 2);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        destroys.load(Ordering::SeqCst),
        destroyed_at_shutdown,
        "the reaper task must not still be running after destroy_all_now"
    );
}

/// At-most-one borrower: across a burst of concurrent acquire/release
/// cycles against a small pool, no two completions ever observe the same
/// resource id live at the same time.
#[tokio::test]
async fn at_most_one_borrower_per_resource() {
    let (manager, _creates, _destroys) = CountingManager::new();
    let pool = Pool::builder()
        .max_size(2)
        .idle_timeout(Duration::from_secs(60))
        .build(manager)
        .await
        .unwrap();

    let live: Arc<Mutex<HashSet<u32>>> = Arc::new(Mutex::new(HashSet::new()));
    let violations = Arc::new(AtomicU32::new(0));

    let tasks = (0..20).map(|_| {
        let pool = pool.clone();
        let live = live.clone();
        let violations = violations.clone();
        async move {
            let conn = pool.get(0).await.expect("acquire should succeed");
            let first_seen = !live.lock().unwrap().insert(conn.id);
            if first_seen {
                violations.fetch_add(1, Ordering::SeqCst);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
            live.lock().unwrap().remove(&conn.id);
            drop(conn);
        }
    });

    join_all(tasks).await;
    assert_eq!(violations.load(Ordering::SeqCst), 0);
}

/// Creation accounting: the number of `create` successes equals the number
/// of `destroy` calls plus the number of currently-live slots, at every
/// point we sample it.
#[tokio::test]
async fn creation_accounting_balances() {
    let (manager, creates, destroys) = CountingManager::new();
    let pool = Pool::builder()
        .max_size(3)
        .idle_timeout(Duration::from_millis(20))
        .reap_interval(Duration::from_millis(5))
        .build(manager)
        .await
        .unwrap();

    let mut completions = Vec::new();
    for _ in 0..8 {
        let (_admitted, completion) = pool.acquire(0).await;
        completions.push(completion);
    }
    join_all(completions.into_iter().map(|completion| async move {
        let conn = completion.await.expect("acquire should succeed");
        drop(conn);
    }))
    .await;

    // Let the reaper fully drain the idle pool down to min (0).
    tokio::time::sleep(Duration::from_millis(200)).await;

    let live = pool.count().await;
    assert_eq!(creates.load(Ordering::SeqCst), destroys.load(Ordering::SeqCst) + live);
}

/// Idempotent drain: calling `drain` repeatedly resolves every call exactly
/// once, with no hang and no double-invocation artifact.
#[tokio::test]
async fn idempotent_drain() {
    let (manager, _creates, destroys) = CountingManager::new();
    let pool = Pool::builder()
        .max_size(2)
        .idle_timeout(Duration::from_secs(60))
        .build(manager)
        .await
        .unwrap();

    let conn = pool.get(0).await.unwrap();

    let pool2 = pool.clone();
    let pool3 = pool.clone();
    let drain_while_borrowed = tokio::spawn(async move { pool2.drain().await });
    let drain_again = tokio::spawn(async move { pool3.drain().await });

    tokio::time::sleep(Duration::from_millis(10)).await;
    drop(conn);

    drain_while_borrowed.await.expect("drain task must not panic");
    drain_again.await.expect("second drain task must not panic");

    // A third, fully-post-hoc drain call must also resolve immediately.
    pool.drain().await;

    assert_eq!(destroys.load(Ordering::SeqCst), 1);
}
