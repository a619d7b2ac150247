//! A sharded in-memory cache with a fixed time-to-live per entry.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::error::Result;

const SHARD_COUNT: usize = 16;

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

pub struct TtlCache<K, V> {
    shards: Vec<RwLock<HashMap<K, Entry<V>>>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| RwLock::new(HashMap::new())).collect(),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn shard(&self, key: &K) -> &RwLock<HashMap<K, Entry<V>>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % SHARD_COUNT]
    }

    /// Returns the live cached value for `key`, if any.
    pub fn get(&self, key: &K) -> Option<V> {
        let shard = self.shard(key).read();
        shard
            .get(key)
            .filter(|e| e.inserted_at.elapsed() < self.ttl)
            .map(|e| e.value.clone())
    }

    /// Returns the cached value or computes, stores and returns a fresh one.
    ///
    /// No lock is held while `fetch` runs, so concurrent misses for the same
    /// key may each call `fetch`; the last insert wins. Errors are not cached.
    pub fn get_or_fetch<F>(&self, key: &K, fetch: F) -> Result<V>
    where
        F: FnOnce(&K) -> Result<V>,
    {
        if let Some(value) = self.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(value);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let value = fetch(key)?;

        self.shard(key).write().insert(
            key.clone(),
            Entry {
                value: value.clone(),
                inserted_at: Instant::now(),
            },
        );

        Ok(value)
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut removed = 0;
        for shard in &self.shards {
            let mut shard = shard.write();
            let before = shard.len();
            shard.retain(|_, e| e.inserted_at.elapsed() < self.ttl);
            removed += before - shard.len();
        }
        removed
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::cell::Cell;

    #[test]
    fn test_hit_does_not_fetch() {
        let cache = TtlCache::new(Duration::from_secs(60));
        let calls = Cell::new(0);
        let fetch = |k: &u32| {
            calls.set(calls.get() + 1);
            Ok(k * 2)
        };

        assert_eq!(cache.get_or_fetch(&4, fetch).unwrap(), 8);
        assert_eq!(cache.get_or_fetch(&4, fetch).unwrap(), 8);
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn test_expired_entry_is_refetched() {
        let cache = TtlCache::new(Duration::from_millis(20));
        let calls = Cell::new(0);
        let fetch = |_: &&str| {
            calls.set(calls.get() + 1);
            Ok(calls.get())
        };

        assert_eq!(cache.get_or_fetch(&"k", fetch).unwrap(), 1);
        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.get_or_fetch(&"k", fetch).unwrap(), 2);
    }

    #[test]
    fn test_errors_are_not_cached() {
        let cache: TtlCache<u8, bool> = TtlCache::new(Duration::from_secs(60));

        assert!(cache.get_or_fetch(&1, |_| Err(Error::not_found("space"))).is_err());
        assert!(cache.is_empty());
        assert!(cache.get_or_fetch(&1, |_| Ok(true)).unwrap());
    }

    #[test]
    fn test_purge_expired() {
        let cache = TtlCache::new(Duration::from_millis(20));
        for i in 0..10u32 {
            cache.get_or_fetch(&i, |k| Ok(*k)).unwrap();
        }
        assert_eq!(cache.len(), 10);
        assert_eq!(cache.purge_expired(), 0);

        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.purge_expired(), 10);
        assert!(cache.is_empty());
    }
}
