//! Memoization with TTL expiry and an injectable clock

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::types::User;

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(start.timestamp_millis()),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let by = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.millis.fetch_add(by, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_default()
    }
}

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache
    pub capacity: usize,

    /// Time-to-live for memoized values
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            ttl: Duration::from_secs(60),
        }
    }
}

/// Key for a memoized per-user function result.
///
/// Keys are built from the user's identity string, never object identity;
/// the anonymous user maps to an empty identity.
pub fn memo_key(function: &str, user: Option<&User>) -> String {
    format!("{}/{}", function, user.map(User::name).unwrap_or_default())
}

/// Key for a category page: includes the query string
pub fn category_key(full_path: &str) -> String {
    format!("category/{}", full_path)
}

/// Key for an entry page: the query string is ignored
pub fn entry_key(full_path: &str) -> String {
    let path = full_path.split_once('?').map_or(full_path, |(path, _)| path);
    format!("entry/{}", path)
}

#[derive(Clone)]
struct CachedEntry<V> {
    value: V,
    cached_at: DateTime<Utc>,
}

impl<V> CachedEntry<V> {
    fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match (now - self.cached_at).to_std() {
            Ok(elapsed) => elapsed > ttl,
            // cached "in the future" means the clock went backwards
            Err(_) => false,
        }
    }
}

/// TTL-bounded memo cache
///
/// Thread-safe via DashMap. Concurrent misses for the same key may compute
/// the value more than once; the last write wins.
pub struct MemoCache<V> {
    entries: DashMap<String, CachedEntry<V>>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    hits: AtomicUsize,
    misses: AtomicUsize,
    expirations: AtomicUsize,
}

impl<V: Clone> MemoCache<V> {
    pub fn new(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            clock,
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
            expirations: AtomicUsize::new(0),
        }
    }

    /// Get a live value
    pub fn get(&self, key: &str) -> Option<V> {
        if let Some(entry) = self.entries.get(key) {
            if entry.is_expired(self.clock.now(), self.config.ttl) {
                drop(entry);
                self.entries.remove(key);
                self.expirations.fetch_add(1, Ordering::Relaxed);
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }

            self.hits.fetch_add(1, Ordering::Relaxed);
            return Some(entry.value.clone());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store a value
    pub fn put(&self, key: impl Into<String>, value: V) {
        if self.entries.len() >= self.config.capacity {
            self.evict_oldest();
        }

        self.entries.insert(
            key.into(),
            CachedEntry {
                value,
                cached_at: self.clock.now(),
            },
        );
    }

    /// Get a live value or compute and store it
    pub fn get_or_insert_with<F>(&self, key: &str, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(value) = self.get(key) {
            return value;
        }

        let value = compute();
        self.put(key, value.clone());
        value
    }

    /// Drop a single key
    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Drop every key
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            entries: self.entries.len(),
            max_entries: self.config.capacity,
        }
    }

    /// Evict expired entries, then the oldest 10% if still full
    fn evict_oldest(&self) {
        let now = self.clock.now();
        let ttl = self.config.ttl;
        self.entries.retain(|_, entry| !entry.is_expired(now, ttl));

        if self.entries.len() < self.config.capacity {
            return;
        }

        let mut by_age: Vec<(String, DateTime<Utc>)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().cached_at))
            .collect();
        by_age.sort_by_key(|(_, cached_at)| *cached_at);

        let to_remove = (self.config.capacity / 10).max(1);
        for (key, _) in by_age.into_iter().take(to_remove) {
            self.entries.remove(&key);
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub expirations: usize,
    pub entries: usize,
    pub max_entries: usize,
}

impl CacheStats {
    /// Calculate cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manual_cache(ttl: Duration, capacity: usize) -> (Arc<ManualClock>, MemoCache<u32>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = MemoCache::new(CacheConfig { capacity, ttl }, clock.clone());
        (clock, cache)
    }

    #[test]
    fn test_cache_put_get() {
        let (_, cache) = manual_cache(Duration::from_secs(60), 100);

        assert!(cache.get("a").is_none());
        cache.put("a", 1);
        assert_eq!(cache.get("a"), Some(1));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn test_cache_ttl() {
        let (clock, cache) = manual_cache(Duration::from_secs(60), 100);

        cache.put("a", 1);
        clock.advance(Duration::from_secs(59));
        assert_eq!(cache.get("a"), Some(1));

        clock.advance(Duration::from_secs(2));
        assert!(cache.get("a").is_none());
        assert_eq!(cache.stats().expirations, 1);
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_get_or_insert_computes_once() {
        let (_, cache) = manual_cache(Duration::from_secs(60), 100);
        let mut calls = 0;

        let first = cache.get_or_insert_with("k", || {
            calls += 1;
            7
        });
        let second = cache.get_or_insert_with("k", || {
            calls += 1;
            8
        });

        assert_eq!((first, second), (7, 7));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_eviction_keeps_capacity() {
        let (clock, cache) = manual_cache(Duration::from_secs(600), 10);

        for i in 0..10 {
            cache.put(format!("k{}", i), i);
            clock.advance(Duration::from_secs(1));
        }
        cache.put("new", 99);

        assert!(cache.stats().entries <= 10);
        assert!(cache.get("k0").is_none(), "oldest entry should be evicted");
        assert_eq!(cache.get("new"), Some(99));
    }

    #[test]
    fn test_invalidate_and_clear() {
        let (_, cache) = manual_cache(Duration::from_secs(60), 100);
        cache.put("a", 1);
        cache.put("b", 2);

        cache.invalidate("a");
        assert!(cache.get("a").is_none());
        assert_eq!(cache.get("b"), Some(2));

        cache.clear();
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_key_conventions() {
        assert_eq!(category_key("/blog/?tag=rust"), "category//blog/?tag=rust");
        assert_eq!(entry_key("/blog/42?utm=x"), "entry//blog/42");
        assert_eq!(entry_key("/blog/42"), "entry//blog/42");

        let alice = User::new("https://alice.example/");
        assert_eq!(memo_key("groups", Some(&alice)), "groups/https://alice.example/");
        assert_eq!(memo_key("groups", None), "groups/");
    }
}
