// TTL cache for resolved photo URLs.
//
// Keyed by provider + category + dimensions so the same logical request
// hits the same entry. Entries are evicted lazily on access.

use dashmap::DashMap;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub url: String,
    pub provider: &'static str,
    pub cached_at: Instant,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
    pub ttl_secs: u64,
}

pub struct PhotoCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
}

impl PhotoCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Deterministic key: provider_category_WxH.
    pub fn key(provider: &str, category: &str, width: u32, height: u32) -> String {
        format!("{provider}_{category}_{width}x{height}")
    }

    /// Fresh entry or nothing; expired entries are removed on the way out.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.get(key)?;
        if entry.cached_at.elapsed() < self.ttl {
            return Some(entry.clone());
        }
        drop(entry);
        self.entries.remove(key);
        debug!(key, "evicted expired photo cache entry");
        None
    }

    pub fn insert(&self, key: String, url: String, provider: &'static str) {
        self.entries.insert(
            key,
            CacheEntry {
                url,
                provider,
                cached_at: Instant::now(),
            },
        );
    }

    pub fn clear(&self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    pub fn stats(&self) -> CacheStats {
        let total = self.entries.len();
        let valid = self
            .entries
            .iter()
            .filter(|e| e.cached_at.elapsed() < self.ttl)
            .count();
        CacheStats {
            total_entries: total,
            valid_entries: valid,
            expired_entries: total - valid,
            ttl_secs: self.ttl.as_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_format_is_stable() {
        assert_eq!(
            PhotoCache::key("unsplash", "nature", 800, 600),
            "unsplash_nature_800x600"
        );
    }

    #[test]
    fn fresh_entries_hit() {
        let cache = PhotoCache::new(Duration::from_secs(60));
        cache.insert("k".into(), "https://example.com/a.jpg".into(), "pexels");
        let hit = cache.get("k").unwrap();
        assert_eq!(hit.url, "https://example.com/a.jpg");
        assert_eq!(hit.provider, "pexels");
    }

    #[test]
    fn expired_entries_are_evicted_on_get() {
        let cache = PhotoCache::new(Duration::from_millis(0));
        cache.insert("k".into(), "u".into(), "pixabay");
        std::thread::sleep(Duration::from_millis(2));
        assert!(cache.get("k").is_none());
        assert_eq!(cache.stats().total_entries, 0);
    }

    #[test]
    fn clear_reports_removed_count() {
        let cache = PhotoCache::new(Duration::from_secs(60));
        cache.insert("a".into(), "u1".into(), "unsplash");
        cache.insert("b".into(), "u2".into(), "unsplash");
        assert_eq!(cache.clear(), 2);
        assert_eq!(cache.stats().total_entries, 0);
    }
}
