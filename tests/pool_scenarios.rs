//! End-to-end scenario coverage (§8) against a small counting/failing mock
//! `Manager`, in the teacher's own integration-test style.

use std::error;
use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cistern::{Manager, Pool};
use futures::future::join_all;

#[derive(Debug)]
struct CreateFailed(u32);

impl fmt::Display for CreateFailed {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "create failed (attempt {})", self.0)
    }
}

impl error::Error for CreateFailed {}

#[derive(Debug)]
struct Resource {
    id: u32,
}

/// Shared counters a test keeps a handle to after the manager itself has
/// been moved into the pool.
#[derive(Clone)]
struct Counters {
    creates: Arc<AtomicU32>,
    destroys: Arc<AtomicU32>,
    destroyed_order: Arc<Mutex<Vec<u32>>>,
}

impl Counters {
    fn creates(&self) -> u32 {
        self.creates.load(Ordering::SeqCst)
    }

    fn destroys(&self) -> u32 {
        self.destroys.load(Ordering::SeqCst)
    }

    fn destroyed_order(&self) -> Vec<u32> {
        self.destroyed_order.lock().unwrap().clone()
    }
}

struct CountingManager {
    counters: Counters,
    next_id: AtomicU32,
    /// Number of leading `create` calls that should fail.
    fail_first: AtomicU32,
    /// The resource id `validate` should reject, or -1 for "always valid".
    invalidate_id: AtomicI64,
}

impl CountingManager {
    fn new() -> (Self, Counters) {
        let counters = Counters {
            creates: Arc::new(AtomicU32::new(0)),
            destroys: Arc::new(AtomicU32::new(0)),
            destroyed_order: Arc::new(Mutex::new(Vec::new())),
        };
        (
            CountingManager {
                counters: counters.clone(),
                next_id: AtomicU32::new(0),
                fail_first: AtomicU32::new(0),
                invalidate_id: AtomicI64::new(-1),
            },
            counters,
        )
    }

    fn with_failures(fail_first: u32) -> (Self, Counters) {
        let (manager, counters) = CountingManager::new();
        manager.fail_first.store(fail_first, Ordering::SeqCst);
        (manager, counters)
    }
}

#[async_trait]
impl Manager for CountingManager {
    type Resource = Resource;
    type Error = CreateFailed;

    async fn create(&self) -> Result<Resource, CreateFailed> {
        let attempt = self.counters.creates.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_first.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
            if n > 0 {
                Some(n - 1)
            } else {
                None
            }
        }).is_ok()
        {
            return Err(CreateFailed(attempt));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(Resource { id })
    }

    async fn destroy(&self, resource: Resource) {
        self.counters.destroys.fetch_add(1, Ordering::SeqCst);
        self.counters.destroyed_order.lock().unwrap().push(resource.id);
    }

    fn validate(&self, resource: &mut Resource) -> bool {
        self.invalidate_id.load(Ordering::SeqCst) != resource.id as i64
    }
}

#[tokio::test]
async fn expansion_to_cap() {
    let (manager, counters) = CountingManager::new();
    let pool = Pool::builder()
        .max_size(2)
        .idle_timeout(Duration::from_millis(50))
        .reap_interval(Duration::from_millis(10))
        .build(manager)
        .await
        .unwrap();

    let mut admitted = Vec::new();
    let mut completions = Vec::new();
    for _ in 0..10 {
        let (was_admitted, completion) = pool.acquire(0).await;
        admitted.push(was_admitted);
        completions.push(completion);
    }

    assert!(admitted[0], "first acquire must be admitted");
    assert!(
        admitted[1..].iter().all(|&a| !a),
        "every subsequent acquire must report admitted = false"
    );

    join_all(completions.into_iter().map(|completion| async move {
        let conn = completion.await.expect("acquire should succeed");
        tokio::time::sleep(Duration::from_millis(100)).await;
        drop(conn);
    }))
    .await;

    assert_eq!(counters.creates(), 2);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(counters.destroys(), 2);
}

#[tokio::test]
async fn minimum_floor_after_drain() {
    let (manager, counters) = CountingManager::new();
    let pool = Pool::builder()
        .min_idle(1)
        .max_size(2)
        .idle_timeout(Duration::from_secs(60))
        .build(manager)
        .await
        .unwrap();

    assert_eq!(counters.creates(), 1);

    pool.drain().await;

    assert_eq!(counters.creates(), 1);
    assert_eq!(counters.destroys(), 1);
    assert_eq!(pool.available_count().await, 0);
}

#[tokio::test]
async fn priority_ordering() {
    let (manager, _counters) = CountingManager::new();
    let pool = Pool::builder()
        .max_size(1)
        .priority_range(2)
        .idle_timeout(Duration::from_secs(60))
        .build(manager)
        .await
        .unwrap();

    let mut low_band_completions = Vec::new();
    for _ in 0..10 {
        let (_admitted, completion) = pool.acquire(1).await;
        low_band_completions.push(completion);
    }
    let mut high_band_completions = Vec::new();
    for _ in 0..10 {
        let (_admitted, completion) = pool.acquire(0).await;
        high_band_completions.push(completion);
    }

    let run = |completions: Vec<_>, finished_at: Arc<std::sync::Mutex<Vec<Duration>>>| {
        let start = std::time::Instant::now();
        join_all(completions.into_iter().map(move |completion| {
            let finished_at = finished_at.clone();
            async move {
                let conn = completion.await.expect("acquire should succeed");
                tokio::time::sleep(Duration::from_millis(50)).await;
                drop(conn);
                finished_at.lock().unwrap().push(start.elapsed());
            }
        }))
    };

    let low_times = Arc::new(std::sync::Mutex::new(Vec::new()));
    let high_times = Arc::new(std::sync::Mutex::new(Vec::new()));

    tokio::join!(
        run(low_band_completions, low_times.clone()),
        run(high_band_completions, high_times.clone()),
    );

    let low_times = low_times.lock().unwrap();
    let high_times = high_times.lock().unwrap();
    assert_eq!(low_times.len(), 10);
    assert_eq!(high_times.len(), 10);

    let last_high = high_times.iter().max().unwrap();
    let last_low = low_times.iter().max().unwrap();
    assert!(
        last_high < last_low,
        "the last band-0 completion ({:?}) must precede the last band-1 completion ({:?})",
        last_high,
        last_low
    );
}

#[tokio::test]
async fn reap_order_is_oldest_idle_first() {
    let (manager, counters) = CountingManager::new();
    let pool = Pool::builder()
        .max_size(2)
        .idle_timeout(Duration::from_millis(100))
        .reap_interval(Duration::from_millis(10))
        .build(manager)
        .await
        .unwrap();

    let (_a, first) = pool.acquire(0).await;
    let first = first.await.unwrap();
    let (_a, second) = pool.acquire(0).await;
    let second = second.await.unwrap();
    let first_id = first.id;
    let second_id = second.id;

    drop(first);
    tokio::time::sleep(Duration::from_millis(5)).await;
    drop(second);

    assert_eq!(counters.creates(), 2);
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(counters.destroys(), 2);
    assert_eq!(
        counters.destroyed_order(),
        vec![first_id, second_id],
        "the resource idle longest (released first) must be reaped first"
    );
}

#[tokio::test]
async fn creation_errors_then_recovery() {
    let (manager, counters) = CountingManager::with_failures(5);
    let pool = Pool::builder()
        .max_size(6)
        .build_unchecked(manager);

    let mut failures = 0;
    for _ in 0..5 {
        match pool.get(0).await {
            Err(cistern::PoolError::Create(CreateFailed(_))) => failures += 1,
            other => panic!("expected a creation error, got {:?}", other),
        }
    }
    assert_eq!(failures, 5);
    assert_eq!(counters.creates(), 5);

    let conn = pool.get(0).await.expect("sixth acquire should succeed");
    assert_eq!(counters.creates(), 6);
    drop(conn);

    assert_eq!(pool.waiting_count().await, 0);
}

#[tokio::test]
async fn validation_failure_discards_and_replaces() {
    let (manager, counters) = CountingManager::new();
    manager.invalidate_id.store(0, Ordering::SeqCst);
    let pool = Pool::builder()
        .max_size(1)
        .build(manager)
        .await
        .unwrap();

    let conn = pool.get(0).await.unwrap();
    assert_eq!(conn.id, 0);
    drop(conn);

    let conn = pool.get(0).await.unwrap();
    assert_eq!(conn.id, 1, "the invalid id-0 resource must have been replaced");
    assert_eq!(counters.destroys(), 1);
    assert_eq!(pool.count().await, 1);
    drop(conn);

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(pool.available_count().await, 1);
}
