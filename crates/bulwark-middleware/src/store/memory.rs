//! In-process counter store.

use super::{CounterStore, StoreResult};
use crate::middleware::BoxFuture;
use dashmap::DashMap;
use futures_util::future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Minimum time between two sweeps of expired counters.
const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Counter store backed by a concurrent map.
///
/// Counts are only shared within one process, so this store suits tests and
/// single-instance deployments. An expired counter is reset on its next
/// access. Counters for keys that are never seen again are dropped by a
/// sweep that runs at most once per second, from within an increment.
#[derive(Debug)]
pub struct MemoryCounterStore {
    counters: DashMap<String, Counter>,
    origin: Instant,
    /// Milliseconds after `origin` of the last sweep.
    last_sweep: AtomicU64,
}

impl Default for MemoryCounterStore {
    fn default() -> Self {
        Self {
            counters: DashMap::new(),
            origin: Instant::now(),
            last_sweep: AtomicU64::new(0),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Counter {
    count: i64,
    expires_at: Option<Instant>,
}

impl Counter {
    const EMPTY: Self = Self {
        count: 0,
        expires_at: None,
    };

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

impl MemoryCounterStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the live count for `key`, if any.
    #[must_use]
    pub fn count(&self, key: &str) -> Option<i64> {
        let now = Instant::now();
        self.counters
            .get(key)
            .filter(|counter| counter.is_live(now))
            .map(|counter| counter.count)
    }

    /// Returns `true` if `key` is live and has an expiry registered.
    #[must_use]
    pub fn has_expiry(&self, key: &str) -> bool {
        let now = Instant::now();
        self.counters
            .get(key)
            .is_some_and(|counter| counter.is_live(now) && counter.expires_at.is_some())
    }

    /// Drops every expired counter.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.counters.retain(|_, counter| counter.is_live(now));
    }

    /// Returns the number of stored counters, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Returns `true` if no counters are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Purges expired counters if the last sweep is older than
    /// [`SWEEP_INTERVAL`]. Must not be called while holding a map entry.
    fn maybe_sweep(&self, now: Instant) {
        let elapsed =
            u64::try_from(now.duration_since(self.origin).as_millis()).unwrap_or(u64::MAX);
        let last = self.last_sweep.load(Ordering::Relaxed);
        let interval = u64::try_from(SWEEP_INTERVAL.as_millis()).unwrap_or(u64::MAX);

        if elapsed.saturating_sub(last) < interval {
            return;
        }
        // One caller wins the sweep; the others carry on.
        if self
            .last_sweep
            .compare_exchange(last, elapsed, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            self.counters.retain(|_, counter| counter.is_live(now));
        }
    }

    fn bump(&self, key: &str, window: Option<Duration>) -> i64 {
        let now = Instant::now();
        self.maybe_sweep(now);

        let mut counter = self
            .counters
            .entry(key.to_string())
            .or_insert(Counter::EMPTY);

        if !counter.is_live(now) {
            *counter = Counter::EMPTY;
        }

        counter.count += 1;
        if counter.count == 1 {
            if let Some(window) = window {
                counter.expires_at = Some(now + window);
            }
        }

        counter.count
    }
}

impl CounterStore for MemoryCounterStore {
    fn increment<'a>(&'a self, key: &'a str) -> BoxFuture<'a, StoreResult<i64>> {
        Box::pin(future::ready(Ok(self.bump(key, None))))
    }

    fn expire<'a>(&'a self, key: &'a str, ttl: Duration) -> BoxFuture<'a, StoreResult<()>> {
        let now = Instant::now();
        if let Some(mut counter) = self.counters.get_mut(key) {
            if counter.is_live(now) {
                counter.expires_at = Some(now + ttl);
            }
        }
        Box::pin(future::ready(Ok(())))
    }

    /// Increments and registers the expiry under one entry lock.
    fn increment_window<'a>(
        &'a self,
        key: &'a str,
        window: Duration,
    ) -> BoxFuture<'a, StoreResult<i64>> {
        Box::pin(future::ready(Ok(self.bump(key, Some(window)))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_increment_creates_and_counts() {
        let store = MemoryCounterStore::new();
        assert_eq!(store.increment("a").await.unwrap(), 1);
        assert_eq!(store.increment("a").await.unwrap(), 2);
        assert_eq!(store.increment("b").await.unwrap(), 1);
        assert_eq!(store.count("a"), Some(2));
        assert!(!store.has_expiry("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_resets_after_ttl() {
        let store = MemoryCounterStore::new();
        store.increment("a").await.unwrap();
        store.expire("a", Duration::from_secs(1)).await.unwrap();
        assert!(store.has_expiry("a"));

        tokio::time::advance(Duration::from_millis(999)).await;
        assert_eq!(store.increment("a").await.unwrap(), 2);

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(store.count("a"), None);
        assert_eq!(store.increment("a").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_expire_missing_key_is_noop() {
        let store = MemoryCounterStore::new();
        store.expire("ghost", Duration::from_secs(1)).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_increment_window_is_atomic() {
        let store = MemoryCounterStore::new();
        let window = Duration::from_secs(1);

        assert_eq!(store.increment_window("a", window).await.unwrap(), 1);
        assert!(store.has_expiry("a"));
        assert_eq!(store.increment_window("a", window).await.unwrap(), 2);

        tokio::time::advance(window).await;
        assert_eq!(store.increment_window("a", window).await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let store = MemoryCounterStore::new();
        store
            .increment_window("short", Duration::from_millis(10))
            .await
            .unwrap();
        store.increment("forever").await.unwrap();

        tokio::time::advance(Duration::from_millis(10)).await;
        store.purge_expired();

        assert_eq!(store.len(), 1);
        assert_eq!(store.count("forever"), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_keys_are_swept() {
        let store = MemoryCounterStore::new();
        let window = Duration::from_secs(1);

        for i in 0..10_000 {
            store
                .increment_window(&format!("client-{i}"), window)
                .await
                .unwrap();
        }
        assert_eq!(store.len(), 10_000);

        tokio::time::advance(Duration::from_secs(3600)).await;
        store.increment_window("newcomer", window).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.count("newcomer"), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_keeps_live_counters() {
        let store = MemoryCounterStore::new();
        store
            .increment_window("short", Duration::from_millis(500))
            .await
            .unwrap();
        store
            .increment_window("long", Duration::from_secs(10))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        store.increment("other").await.unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.count("long"), Some(1));
        assert_eq!(store.count("short"), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_are_not_lost() {
        let store = Arc::new(MemoryCounterStore::new());
        let mut tasks = Vec::new();

        for _ in 0..64 {
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(async move {
                store
                    .increment_window("shared", Duration::from_secs(60))
                    .await
                    .unwrap()
            }));
        }

        let mut seen = Vec::new();
        for task in tasks {
            seen.push(task.await.unwrap());
        }
        seen.sort_unstable();

        assert_eq!(seen, (1..=64).collect::<Vec<i64>>());
        assert_eq!(store.count("shared"), Some(64));
    }
}
