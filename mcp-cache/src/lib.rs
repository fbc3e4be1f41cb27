//! Bounded key/value cache with TTL expiry and LRU eviction.
//!
//! Capacity bounds the entry count; an entry never survives past
//! `inserted_at + ttl` even if it stays the most recently used. Expiry is
//! checked lazily on access and eagerly by [`spawn_sweeper`].

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
struct Entry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Duration,
}

impl<V> Entry<V> {
    fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() > self.ttl
    }
}

/// Monotonic hit/miss/eviction counters for one cache instance, mirroring
/// a process-wide metrics-registry convention but scoped to this cache so
/// callers can expose it under whatever label fits their deployment.
#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: std::sync::atomic::AtomicU64,
    pub misses: std::sync::atomic::AtomicU64,
    pub evictions: std::sync::atomic::AtomicU64,
    pub expirations: std::sync::atomic::AtomicU64,
}

impl CacheStats {
    fn inc(counter: &std::sync::atomic::AtomicU64) {
        counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> (u64, u64, u64, u64) {
        use std::sync::atomic::Ordering::Relaxed;
        (
            self.hits.load(Relaxed),
            self.misses.load(Relaxed),
            self.evictions.load(Relaxed),
            self.expirations.load(Relaxed),
        )
    }
}

/// Bounded, thread-safe `get`/`set`/`invalidate` cache.
///
/// `V` is cloned out on `get`, matching a `TtlCache`-style contract —
/// entries are copies with no write-back to the cache.
pub struct Cache<V: Clone> {
    inner: Mutex<LruCache<String, Entry<V>>>,
    default_ttl: Duration,
    pub stats: Arc<CacheStats>,
}

impl<V: Clone> Cache<V> {
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity >= 1");
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            default_ttl,
            stats: Arc::new(CacheStats::default()),
        }
    }

    /// Fetch a value, evicting it first if its TTL has elapsed (lazy expiry).
    pub fn get(&self, key: &str) -> Option<V> {
        let mut guard = self.inner.lock();
        match guard.get(key) {
            Some(entry) if entry.is_expired() => {
                guard.pop(key);
                drop(guard);
                CacheStats::inc(&self.stats.expirations);
                CacheStats::inc(&self.stats.misses);
                None
            }
            Some(entry) => {
                let value = entry.value.clone();
                drop(guard);
                CacheStats::inc(&self.stats.hits);
                Some(value)
            }
            None => {
                drop(guard);
                CacheStats::inc(&self.stats.misses);
                None
            }
        }
    }

    pub fn set(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let entry = Entry {
            value,
            inserted_at: Instant::now(),
            ttl: ttl.unwrap_or(self.default_ttl),
        };
        let mut guard = self.inner.lock();
        let key = key.into();
        // `push` evicts the LRU tail itself when at capacity and the key is
        // new; it returns that evicted pair (or the old value for this same
        // key, which is not an eviction).
        if let Some((evicted_key, _)) = guard.push(key.clone(), entry) {
            if evicted_key != key {
                drop(guard);
                CacheStats::inc(&self.stats.evictions);
            }
        }
    }

    pub fn invalidate(&self, key: &str) {
        self.inner.lock().pop(key);
    }

    /// Remove every entry whose key starts with `prefix`; used to
    /// label-version graph read caches on write.
    pub fn invalidate_prefix(&self, prefix: &str) {
        let mut guard = self.inner.lock();
        let stale: Vec<String> = guard
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();
        for key in stale {
            guard.pop(&key);
        }
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evict every entry past its TTL; called by the background sweeper so
    /// memory is reclaimed even for keys nobody reads again.
    pub fn sweep_expired(&self) {
        let mut guard = self.inner.lock();
        let expired: Vec<String> = guard
            .iter()
            .filter(|(_, e)| e.is_expired())
            .map(|(k, _)| k.clone())
            .collect();
        let count = expired.len() as u64;
        for key in expired {
            guard.pop(&key);
        }
        drop(guard);
        if count > 0 {
            self.stats
                .expirations
                .fetch_add(count, std::sync::atomic::Ordering::Relaxed);
        }
    }
}

/// Stable serialization → SHA-256 hex key for function-result caching.
pub fn derive_key(name: &str, args: &serde_json::Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update(b"\0");
    hasher.update(serde_json::to_vec(args).unwrap_or_default());
    hex::encode(hasher.finalize())
}

/// Spawns a background task that eagerly sweeps `cache` every `interval`
/// until `token` is cancelled.
pub fn spawn_sweeper<V: Clone + Send + Sync + 'static>(
    cache: Arc<Cache<V>>,
    interval: Duration,
    token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => cache.sweep_expired(),
                _ = token.cancelled() => break,
            }
        }
    })
}
