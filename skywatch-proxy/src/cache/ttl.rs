//! Time-to-live key/value cache
//!
//! Entries expire a fixed duration after they are set. Expired entries are
//! invisible to `get` immediately; the background sweep only reclaims their
//! memory. Values are handed out by clone, so `V` should be a cheap shared
//! handle (`Bytes` for upstream payloads) that readers cannot mutate.

use dashmap::DashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

struct Inner<V> {
    entries: DashMap<String, Entry<V>>,
}

impl<V> Inner<V> {
    fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.entries.len())
    }
}

/// In-memory TTL cache with a background expiry sweep
///
/// Must be constructed inside a Tokio runtime. The sweep stops on
/// [`TtlCache::shutdown`] or when the cache is dropped.
pub struct TtlCache<V> {
    inner: Arc<Inner<V>>,
    ttl: Duration,
    shutdown: CancellationToken,
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration, sweep_interval: Duration) -> Self {
        let inner = Arc::new(Inner {
            entries: DashMap::new(),
        });
        let shutdown = CancellationToken::new();

        tokio::spawn(sweep_loop(
            Arc::downgrade(&inner),
            sweep_interval,
            shutdown.clone(),
        ));

        Self {
            inner,
            ttl,
            shutdown,
        }
    }

    /// Value for `key` if it was set less than one TTL ago
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();

        if let Some(entry) = self.inner.entries.get(key) {
            if entry.expires_at > now {
                return Some(entry.value.clone());
            }
        }

        // Expired: drop it now rather than waiting for the sweep
        self.inner
            .entries
            .remove_if(key, |_, entry| entry.expires_at <= now);
        None
    }

    /// Store `value` under `key` with the cache's TTL
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.ttl);
    }

    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        self.inner.entries.insert(
            key.into(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Number of stored entries, including expired ones not yet swept
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Stop the background sweep. Idempotent.
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            tracing::debug!("Stopping cache sweep");
            self.shutdown.cancel();
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl<V> Drop for TtlCache<V> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn sweep_loop<V>(inner: Weak<Inner<V>>, period: Duration, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let Some(inner) = inner.upgrade() else { break };
                let evicted = inner.sweep();
                if evicted > 0 {
                    tracing::debug!(evicted, remaining = inner.entries.len(), "Cache sweep");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(2);
    const SWEEP: Duration = Duration::from_secs(10);

    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_within_ttl_returns_same_value() {
        let cache: TtlCache<Arc<str>> = TtlCache::new(TTL, SWEEP);
        cache.set("adsb:mil", Arc::from(r#"{"ac":[]}"#));

        tokio::time::advance(Duration::from_millis(1999)).await;

        let first = cache.get("adsb:mil").unwrap();
        let second = cache.get("adsb:mil").unwrap();
        assert_eq!(&*first, r#"{"ac":[]}"#);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test(start_paused = true)]
    async fn test_miss_at_ttl() {
        let cache: TtlCache<Arc<str>> = TtlCache::new(TTL, SWEEP);
        cache.set("k", Arc::from("v"));

        tokio::time::advance(TTL).await;

        assert!(cache.get("k").is_none());
        assert!(cache.is_empty(), "expired entry is dropped on access");
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_set_is_miss() {
        let cache: TtlCache<u32> = TtlCache::new(TTL, SWEEP);
        assert!(cache.get("missing").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_is_per_key() {
        let cache: TtlCache<u32> = TtlCache::new(TTL, SWEEP);
        cache.set("a", 1);
        tokio::time::advance(Duration::from_millis(1500)).await;
        cache.set("b", 2);
        tokio::time::advance(Duration::from_millis(1000)).await;

        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_replaces_value_and_expiry() {
        let cache: TtlCache<u32> = TtlCache::new(TTL, SWEEP);
        cache.set("a", 1);
        tokio::time::advance(Duration::from_millis(1500)).await;
        cache.set("a", 2);
        tokio::time::advance(Duration::from_millis(1500)).await;

        assert_eq!(cache.get("a"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_evicts_expired_entries() {
        let cache: TtlCache<u32> = TtlCache::new(TTL, SWEEP);
        cache.set("short", 1);
        cache.set_with_ttl("long", 2, Duration::from_secs(60));
        assert_eq!(cache.len(), 2);

        tokio::time::advance(SWEEP + Duration::from_millis(1)).await;
        settle().await;

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("long"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_sweep() {
        let cache: TtlCache<u32> = TtlCache::new(TTL, SWEEP);
        cache.set("k", 1);

        cache.shutdown();
        cache.shutdown();
        assert!(cache.is_shut_down());

        tokio::time::advance(SWEEP * 3).await;
        settle().await;

        // Not swept, but still invisible to readers
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("k"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_instances_are_independent() {
        let first: TtlCache<u32> = TtlCache::new(TTL, SWEEP);
        let second: TtlCache<u32> = TtlCache::new(TTL, SWEEP);

        first.set("k", 1);
        second.shutdown();

        assert_eq!(first.get("k"), Some(1));
        assert_eq!(second.get("k"), None);
        assert!(!first.is_shut_down());
    }
}
