use dashmap::DashMap;
use time::{Duration, OffsetDateTime};

use super::stats::CacheStats;
use crate::types::CacheEntry;

/// Response cache keyed by request URL.
#[derive(Debug)]
pub struct MemoryCache<T> {
    entries: DashMap<String, CacheEntry<T>>,
    ttl: Duration,
    stats: CacheStats,
}

impl<T: Clone> MemoryCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            stats: CacheStats::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<T> {
        self.lookup(key, |_| 0)
    }

    /// Same as [`MemoryCache::get`] but also accounts the served size.
    pub fn get_with_size(&self, key: &str, size_fn: impl FnOnce(&T) -> usize) -> Option<T> {
        self.lookup(key, size_fn)
    }

    fn lookup(&self, key: &str, size_fn: impl FnOnce(&T) -> usize) -> Option<T> {
        let mut expired = false;
        let result = self.entries.get(key).and_then(|entry| {
            if OffsetDateTime::now_utc() - entry.stored_at <= self.ttl {
                self.stats.record_bytes(size_fn(&entry.value) as u64);
                Some(entry.value.clone())
            } else {
                expired = true;
                None
            }
        });

        if expired {
            self.entries.remove(key);
            self.stats.record_expired();
            self.stats.set_entry_count(self.entries.len());
        }

        if result.is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
        result
    }

    pub fn insert(&self, key: impl Into<String>, value: T) {
        let entry = CacheEntry {
            value,
            stored_at: OffsetDateTime::now_utc(),
        };
        self.entries.insert(key.into(), entry);
        self.stats.set_entry_count(self.entries.len());
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.stats.set_entry_count(0);
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn respects_ttl() {
        let cache = MemoryCache::new(Duration::milliseconds(50));
        cache.insert("key", 42);
        assert_eq!(cache.get("key"), Some(42));

        std::thread::sleep(std::time::Duration::from_millis(120));
        assert!(cache.get("key").is_none());

        let snapshot = cache.stats().snapshot();
        assert_eq!(snapshot.hits, 1);
        assert_eq!(snapshot.misses, 1);
        assert_eq!(snapshot.expired, 1, "expired entry should be evicted");
        assert_eq!(snapshot.entry_count, 0);
    }

    #[test]
    fn tracks_bytes_served() {
        let cache = MemoryCache::new(Duration::hours(1));
        cache.insert("page-1", vec![1u8; 1024]);
        cache.insert("page-2", vec![2u8; 512]);

        cache.get_with_size("page-1", Vec::len);
        cache.get_with_size("page-2", Vec::len);
        cache.get_with_size("page-3", Vec::len);

        let snapshot = cache.stats().snapshot();
        assert_eq!(snapshot.bytes_served, 1536);
        assert_eq!(snapshot.hits, 2);
        assert_eq!(snapshot.misses, 1);
    }

    #[test]
    fn clear_resets_entry_count() {
        let cache = MemoryCache::new(Duration::hours(1));
        cache.insert("a", "x".to_string());
        cache.insert("b", "y".to_string());
        assert_eq!(cache.stats().snapshot().entry_count, 2);

        cache.clear();
        assert_eq!(cache.stats().snapshot().entry_count, 0);
        assert!(cache.get("a").is_none());
    }
}
