//! Generic TTL + fingerprint + LRU cache fronting the project registry and
//! the sidecar supervisor.
//!
//! A single `tokio::sync::Mutex<HashMap<..>>` rather than a sharded
//! structure: entry counts are small (bounded by `cache_max_size`, default
//! 10) and calls are already serialized behind the supervisor's own mutex
//! for sidecar-backed tools, so contention here is not a concern.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, trace};

struct Entry<V> {
    value: V,
    fingerprint: String,
    inserted_at: Instant,
    last_access: Instant,
}

/// Outcome of a [`Cache::get`] lookup.
#[derive(Debug, PartialEq, Eq)]
pub enum Lookup<V> {
    Hit(V),
    Miss,
    /// Present but the fingerprint no longer matches; treated as a miss by
    /// callers, but distinguished here for cache-stats/tests.
    Stale,
}

/// A bounded, TTL-expiring, fingerprint-validated cache.
///
/// `K` identifies the cached unit (e.g. a project path); the fingerprint is
/// a second, content-derived key supplied at `get`/`put` time — a cache hit
/// requires both the slot key and its fingerprint to match.
pub struct Cache<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
    ttl: Duration,
    max_size: usize,
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration, max_size: usize) -> Self {
        let max_size = if max_size == 0 { 10 } else { max_size };
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            max_size,
        }
    }

    /// Look up `key`, validating both TTL and `fingerprint`. A stale TTL or
    /// mismatched fingerprint is treated as absence by the caller but
    /// evicted here so the slot doesn't linger.
    pub async fn get(&self, key: &K, fingerprint: &str) -> Lookup<V> {
        let mut entries = self.entries.lock().await;
        let Some(entry) = entries.get_mut(key) else {
            trace!("cache miss: no entry");
            return Lookup::Miss;
        };

        if entry.inserted_at.elapsed() > self.ttl {
            debug!(ttl = ?self.ttl, "cache entry expired, evicting");
            entries.remove(key);
            return Lookup::Miss;
        }

        if entry.fingerprint != fingerprint {
            debug!("cache entry fingerprint mismatch, evicting");
            entries.remove(key);
            return Lookup::Stale;
        }

        entry.last_access = Instant::now();
        debug!("cache hit");
        Lookup::Hit(entry.value.clone())
    }

    /// Insert or replace `key`'s cached value, evicting the least-recently
    /// accessed entry first if this insert would exceed `max_size`.
    pub async fn put(&self, key: K, fingerprint: String, value: V) {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        if !entries.contains_key(&key) && entries.len() >= self.max_size {
            if let Some(evict_key) = entries
                .iter()
                .min_by_key(|(_, e)| e.last_access)
                .map(|(k, _)| k.clone())
            {
                debug!(max_size = self.max_size, "cache full, evicting least-recently-used entry");
                entries.remove(&evict_key);
            }
        }

        entries.insert(
            key,
            Entry {
                value,
                fingerprint,
                inserted_at: now,
                last_access: now,
            },
        );
    }

    /// Drop `key` unconditionally, e.g. on an explicit invalidation signal.
    pub async fn invalidate(&self, key: &K) {
        if self.entries.lock().await.remove(key).is_some() {
            debug!("cache entry invalidated");
        }
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test]
    async fn miss_on_empty_cache() {
        let cache: Cache<String, u32> = Cache::new(Duration::from_secs(60), 10);
        assert_eq!(cache.get(&"a".to_string(), "fp1").await, Lookup::Miss);
    }

    #[tokio::test]
    async fn hit_with_matching_fingerprint() {
        let cache = Cache::new(Duration::from_secs(60), 10);
        cache.put("a".to_string(), "fp1".to_string(), 42).await;
        assert_eq!(cache.get(&"a".to_string(), "fp1").await, Lookup::Hit(42));
    }

    #[tokio::test]
    async fn stale_on_fingerprint_mismatch() {
        let cache = Cache::new(Duration::from_secs(60), 10);
        cache.put("a".to_string(), "fp1".to_string(), 42).await;
        assert_eq!(cache.get(&"a".to_string(), "fp2").await, Lookup::Stale);
        // evicted after mismatch
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn expires_after_ttl() {
        let cache = Cache::new(Duration::from_millis(10), 10);
        cache.put("a".to_string(), "fp1".to_string(), 42).await;
        sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.get(&"a".to_string(), "fp1").await, Lookup::Miss);
    }

    #[tokio::test]
    async fn evicts_least_recently_used_when_full() {
        let cache = Cache::new(Duration::from_secs(60), 2);
        cache.put("a".to_string(), "fp".to_string(), 1).await;
        cache.put("b".to_string(), "fp".to_string(), 2).await;
        // touch "a" so "b" becomes the least-recently-used entry
        let _ = cache.get(&"a".to_string(), "fp").await;
        cache.put("c".to_string(), "fp".to_string(), 3).await;

        assert_eq!(cache.get(&"b".to_string(), "fp").await, Lookup::Miss);
        assert_eq!(cache.get(&"a".to_string(), "fp").await, Lookup::Hit(1));
        assert_eq!(cache.get(&"c".to_string(), "fp").await, Lookup::Hit(3));
    }

    #[tokio::test]
    async fn non_positive_max_size_coerces_to_ten() {
        let cache: Cache<String, u32> = Cache::new(Duration::from_secs(60), 0);
        for i in 0..10 {
            cache.put(format!("k{i}"), "fp".to_string(), i).await;
        }
        assert_eq!(cache.len().await, 10);
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let cache = Cache::new(Duration::from_secs(60), 10);
        cache.put("a".to_string(), "fp1".to_string(), 42).await;
        cache.invalidate(&"a".to_string()).await;
        assert_eq!(cache.get(&"a".to_string(), "fp1").await, Lookup::Miss);
    }
}
