//! Query result table with tag invalidation and single-flight computation.
//!
//! Entry lifecycle: absent → pending (compute in flight) → fresh → stale
//! (detected lazily on the next lookup) → absent. Entries are replaced, never
//! updated in place.

use std::any::Any;
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt, Shared};
use lru::LruCache;
use metrics::counter;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::application::repos::SourceError;

use super::config::{CacheConfig, CacheOptions, Ttl};
use super::keys::{CacheTag, QueryDescriptor};
use super::lock::mutex_lock;

const SOURCE: &str = "cache::store";

type CachedValue = Arc<dyn Any + Send + Sync>;
type Flight = Shared<BoxFuture<'static, Result<CachedValue, SourceError>>>;

#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error(transparent)]
    Compute(#[from] SourceError),
    #[error("cached value for `{key}` has an unexpected type")]
    TypeMismatch { key: String },
}

struct CacheEntry {
    value: CachedValue,
    expires_at: Option<Instant>,
    tags: BTreeSet<CacheTag>,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|deadline| now < deadline)
    }
}

struct InFlight {
    id: u64,
    tags: BTreeSet<CacheTag>,
    flight: Flight,
}

struct QueryTable {
    entries: LruCache<QueryDescriptor, CacheEntry>,
    in_flight: HashMap<QueryDescriptor, InFlight>,
    next_flight_id: u64,
}

enum Lookup {
    Hit(CachedValue),
    Join(Flight),
    /// Nothing usable was stored or pending; a new flight was started.
    Miss(Flight),
}

/// Process-wide query cache. Cloning shares the same table.
///
/// Must be used from within a Tokio runtime: misses run their computation as
/// a spawned task so it completes even if every waiting caller goes away.
#[derive(Clone)]
pub struct QueryCache {
    config: Arc<CacheConfig>,
    table: Arc<Mutex<QueryTable>>,
}

impl QueryCache {
    pub fn new(config: CacheConfig) -> Self {
        let table = QueryTable {
            entries: LruCache::new(config.capacity_non_zero()),
            in_flight: HashMap::new(),
            next_flight_id: 0,
        };
        Self {
            config: Arc::new(config),
            table: Arc::new(Mutex::new(table)),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Return the cached result for `descriptor`, computing it on a miss.
    ///
    /// A fresh entry is returned without calling `compute`. Concurrent misses
    /// for the same descriptor share one computation. Failed computations are
    /// propagated and never stored.
    pub async fn get_or_compute<T, F, Fut>(
        &self,
        descriptor: QueryDescriptor,
        options: CacheOptions,
        compute: F,
    ) -> Result<T, CacheError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, SourceError>> + Send + 'static,
    {
        if !self.config.enabled {
            return compute().await.map_err(CacheError::from);
        }

        let operation = descriptor.operation().as_str();
        let flight = match self.lookup(&descriptor, options, compute) {
            Lookup::Hit(value) => {
                counter!("inkpost_cache_hit_total", "operation" => operation).increment(1);
                debug!(cache = "query", outcome = "hit", key = %descriptor, "serving cached result");
                return downcast(&descriptor, value);
            }
            Lookup::Join(flight) => {
                counter!("inkpost_cache_join_total", "operation" => operation).increment(1);
                debug!(cache = "query", outcome = "join", key = %descriptor, "awaiting in-flight result");
                flight
            }
            Lookup::Miss(flight) => {
                counter!("inkpost_cache_miss_total", "operation" => operation).increment(1);
                debug!(cache = "query", outcome = "miss", key = %descriptor, "computing result");
                flight
            }
        };

        let value = flight.await?;
        downcast(&descriptor, value)
    }

    /// Drop every entry carrying any of `tags`, regardless of expiry.
    ///
    /// Computations in flight for matching entries are detached: callers
    /// already waiting still receive their result, but it is not stored.
    /// Returns the number of stored entries removed.
    pub fn invalidate(&self, tags: &[CacheTag]) -> usize {
        if tags.is_empty() {
            return 0;
        }

        let mut table = mutex_lock(&self.table, SOURCE, "invalidate");
        let doomed: Vec<QueryDescriptor> = table
            .entries
            .iter()
            .filter(|(_, entry)| entry.tags.iter().any(|tag| tags.contains(tag)))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            table.entries.pop(key);
        }

        let pending_before = table.in_flight.len();
        table
            .in_flight
            .retain(|_, flight| !flight.tags.iter().any(|tag| tags.contains(tag)));
        let detached = pending_before - table.in_flight.len();

        counter!("inkpost_cache_invalidated_total").increment(doomed.len() as u64);
        debug!(
            cache = "query",
            tags = ?tags,
            removed = doomed.len(),
            detached,
            "invalidated cache entries"
        );
        doomed.len()
    }

    /// Drop all entries and detach all in-flight computations.
    pub fn clear(&self) {
        let mut table = mutex_lock(&self.table, SOURCE, "clear");
        table.entries.clear();
        table.in_flight.clear();
    }

    /// Number of stored entries, including stale ones not yet observed.
    pub fn len(&self) -> usize {
        mutex_lock(&self.table, SOURCE, "len").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve `descriptor` against stored entries and pending flights, starting
    /// a flight on a miss. All three steps share one lock acquisition, so a
    /// flight finishing concurrently is either seen as an entry or joined.
    fn lookup<T, F, Fut>(
        &self,
        descriptor: &QueryDescriptor,
        options: CacheOptions,
        compute: F,
    ) -> Lookup
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, SourceError>> + Send + 'static,
    {
        let mut table = mutex_lock(&self.table, SOURCE, "lookup");
        let now = Instant::now();

        let cached = table
            .entries
            .get(descriptor)
            .map(|entry| entry.is_fresh(now).then(|| Arc::clone(&entry.value)));
        match cached {
            Some(Some(value)) => return Lookup::Hit(value),
            Some(None) => {
                table.entries.pop(descriptor);
                debug!(cache = "query", key = %descriptor, "evicted stale entry");
            }
            None => {}
        }

        if let Some(pending) = table.in_flight.get(descriptor) {
            return Lookup::Join(pending.flight.clone());
        }

        Lookup::Miss(self.start_flight(&mut table, descriptor.clone(), options, compute()))
    }

    fn start_flight<T, Fut>(
        &self,
        table: &mut QueryTable,
        descriptor: QueryDescriptor,
        options: CacheOptions,
        pending: Fut,
    ) -> Flight
    where
        T: Send + Sync + 'static,
        Fut: Future<Output = Result<T, SourceError>> + Send + 'static,
    {
        let id = table.next_flight_id;
        table.next_flight_id = table.next_flight_id.wrapping_add(1);

        let task_table = Arc::clone(&self.table);
        let task_key = descriptor.clone();
        let ttl = options.ttl;
        let task_tags = options.tags.clone();
        let handle = tokio::spawn(async move {
            let outcome = pending.await.map(|value| Arc::new(value) as CachedValue);
            complete_flight(&task_table, &task_key, id, ttl, task_tags, &outcome);
            outcome
        });

        let abandon_table = Arc::clone(&self.table);
        let abandon_key = descriptor.clone();
        let flight = async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    let mut table = mutex_lock(&abandon_table, SOURCE, "abandon_flight");
                    if table
                        .in_flight
                        .get(&abandon_key)
                        .is_some_and(|current| current.id == id)
                    {
                        table.in_flight.remove(&abandon_key);
                    }
                    Err(SourceError::unexpected(format!(
                        "query task for `{abandon_key}` failed: {err}"
                    )))
                }
            }
        }
        .boxed()
        .shared();

        table.in_flight.insert(
            descriptor,
            InFlight {
                id,
                tags: options.tags,
                flight: flight.clone(),
            },
        );
        flight
    }
}

/// Store a finished computation if its flight is still the current one.
fn complete_flight(
    table: &Mutex<QueryTable>,
    key: &QueryDescriptor,
    id: u64,
    ttl: Ttl,
    tags: BTreeSet<CacheTag>,
    outcome: &Result<CachedValue, SourceError>,
) {
    if let Err(err) = outcome {
        counter!("inkpost_cache_compute_failure_total", "operation" => key.operation().as_str())
            .increment(1);
        warn!(cache = "query", key = %key, error = %err, "query computation failed");
    }

    let mut table = mutex_lock(table, SOURCE, "complete_flight");
    let current = table
        .in_flight
        .get(key)
        .is_some_and(|flight| flight.id == id);
    if !current {
        debug!(cache = "query", key = %key, "discarding result of detached computation");
        return;
    }
    table.in_flight.remove(key);

    if let Ok(value) = outcome {
        let entry = CacheEntry {
            value: Arc::clone(value),
            expires_at: ttl.expires_at(Instant::now()),
            tags,
        };
        if let Some((evicted, _)) = table.entries.push(key.clone(), entry) {
            if evicted != *key {
                counter!("inkpost_cache_evict_total").increment(1);
                debug!(cache = "query", key = %evicted, "evicted entry for capacity");
            }
        }
    }
}

fn downcast<T>(descriptor: &QueryDescriptor, value: CachedValue) -> Result<T, CacheError>
where
    T: Clone + Send + Sync + 'static,
{
    value
        .downcast::<T>()
        .map(|typed| T::clone(&typed))
        .map_err(|_| CacheError::TypeMismatch {
            key: descriptor.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::cache::config::TtlClass;
    use crate::cache::keys::Operation;

    fn cache() -> QueryCache {
        QueryCache::new(CacheConfig::default())
    }

    fn posts_page(page: u32) -> QueryDescriptor {
        QueryDescriptor::new(Operation::ListPosts).param("page", page)
    }

    fn short_posts() -> CacheOptions {
        CacheOptions::new(CacheConfig::default().ttl(TtlClass::Short)).tag(CacheTag::Posts)
    }

    async fn counted(
        cache: &QueryCache,
        descriptor: QueryDescriptor,
        options: CacheOptions,
        calls: &Arc<AtomicUsize>,
        value: &'static str,
    ) -> Result<String, CacheError> {
        let calls = Arc::clone(calls);
        cache
            .get_or_compute(descriptor, options, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(value.to_string())
            })
            .await
    }

    #[tokio::test(start_paused = true)]
    async fn hit_within_ttl_skips_compute() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));

        let first = counted(&cache, posts_page(1), short_posts(), &calls, "one").await;
        tokio::time::advance(Duration::from_secs(59)).await;
        let second = counted(&cache, posts_page(1), short_posts(), &calls, "two").await;

        assert_eq!(first.expect("first"), "one");
        assert_eq!(second.expect("second"), "one");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_triggers_recompute_and_overwrites() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));

        counted(&cache, posts_page(1), short_posts(), &calls, "old")
            .await
            .expect("seed");
        tokio::time::advance(Duration::from_secs(60)).await;
        let refreshed = counted(&cache, posts_page(1), short_posts(), &calls, "new").await;
        let again = counted(&cache, posts_page(1), short_posts(), &calls, "newer").await;

        assert_eq!(refreshed.expect("refreshed"), "new");
        assert_eq!(again.expect("again"), "new");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn no_expiry_entries_outlive_any_ttl() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let options = CacheOptions::new(Ttl::NoExpiry).tag(CacheTag::Categories);
        let key = QueryDescriptor::new(Operation::Categories);

        counted(&cache, key.clone(), options.clone(), &calls, "a")
            .await
            .expect("seed");
        tokio::time::advance(Duration::from_secs(365 * 24 * 3600)).await;
        let later = counted(&cache, key, options, &calls, "b").await;

        assert_eq!(later.expect("later"), "a");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failures_propagate_and_are_not_cached() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));

        let failing = Arc::clone(&calls);
        let err = cache
            .get_or_compute(posts_page(1), short_posts(), move || async move {
                failing.fetch_add(1, Ordering::SeqCst);
                Err::<String, _>(SourceError::transport("connection refused"))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::Compute(SourceError::Transport { .. })));
        assert!(cache.is_empty());

        let ok = counted(&cache, posts_page(1), short_posts(), &calls, "fresh").await;
        assert_eq!(ok.expect("retry succeeds"), "fresh");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidate_drops_only_matching_tags() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let comments_key = QueryDescriptor::new(Operation::Comments).param("post_id", "1");
        let comments_options = CacheOptions::new(Ttl::NoExpiry).tag(CacheTag::Comments);

        counted(&cache, posts_page(1), short_posts(), &calls, "posts")
            .await
            .expect("posts");
        counted(&cache, comments_key.clone(), comments_options.clone(), &calls, "comments")
            .await
            .expect("comments");
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert_eq!(cache.invalidate(&[CacheTag::Posts]), 1);

        counted(&cache, posts_page(1), short_posts(), &calls, "posts")
            .await
            .expect("posts again");
        counted(&cache, comments_key, comments_options, &calls, "comments")
            .await
            .expect("comments again");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn invalidating_unknown_tags_is_a_no_op() {
        let cache = cache();
        assert_eq!(cache.invalidate(&[CacheTag::Authors]), 0);
        assert_eq!(cache.invalidate(&[]), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_misses_share_one_computation() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));

        let lookups = (0..5).map(|_| {
            let calls = Arc::clone(&calls);
            cache.get_or_compute(posts_page(1), short_posts(), move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(42u64)
            })
        });
        let results = futures::future::join_all(lookups).await;

        assert!(results.iter().all(|r| matches!(r, Ok(42))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_callers_never_recompute_a_finished_flight() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));

        for round in 0..50u32 {
            let callers: Vec<_> = (0..8)
                .map(|_| {
                    let cache = cache.clone();
                    let calls = Arc::clone(&calls);
                    tokio::spawn(async move {
                        counted(&cache, posts_page(round), short_posts(), &calls, "fresh").await
                    })
                })
                .collect();
            for caller in callers {
                let value = caller.await.expect("caller task").expect("value");
                assert_eq!(value, "fresh");
            }
        }

        assert_eq!(calls.load(Ordering::SeqCst), 50);
        assert_eq!(cache.len(), 50);
    }

    #[tokio::test(start_paused = true)]
    async fn invalidation_detaches_in_flight_computation() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));

        let slow_calls = Arc::clone(&calls);
        let slow = cache.get_or_compute(posts_page(1), short_posts(), move || async move {
            slow_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok("stale".to_string())
        });
        let invalidate = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cache.invalidate(&[CacheTag::Posts]);
        };
        let (value, ()) = tokio::join!(slow, invalidate);
        assert_eq!(value.expect("waiter still gets its value"), "stale");

        let fresh = counted(&cache, posts_page(1), short_posts(), &calls, "fresh").await;
        assert_eq!(fresh.expect("fresh"), "fresh");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn type_mismatch_is_reported() {
        let cache = cache();
        cache
            .get_or_compute(posts_page(1), short_posts(), || async { Ok(1u32) })
            .await
            .expect("seed");
        let err = cache
            .get_or_compute(posts_page(1), short_posts(), || async { Ok("x".to_string()) })
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::TypeMismatch { .. }));
    }

    #[tokio::test]
    async fn disabled_cache_always_computes() {
        let cache = QueryCache::new(CacheConfig {
            enabled: false,
            ..Default::default()
        });
        let calls = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            counted(&cache, posts_page(1), short_posts(), &calls, "v")
                .await
                .expect("value");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn capacity_evicts_least_recently_used() {
        let cache = QueryCache::new(CacheConfig {
            capacity: 2,
            ..Default::default()
        });
        let calls = Arc::new(AtomicUsize::new(0));

        for page in 1..=3 {
            counted(&cache, posts_page(page), short_posts(), &calls, "v")
                .await
                .expect("value");
        }
        assert_eq!(cache.len(), 2);

        counted(&cache, posts_page(1), short_posts(), &calls, "v")
            .await
            .expect("page one recomputed");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
