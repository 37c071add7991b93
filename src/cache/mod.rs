//! # Content Cache Module
//!
//! A time-bounded key-value cache mapping a resolved URL (optionally combined
//! with a hash of the task text) to a previously computed summary.
//!
//! ## Semantics
//!
//! - An entry is valid only while `now - stored_at < ttl`
//! - Expired entries read as absent; they are not actively evicted
//! - Writes are last-writer-wins
//! - Safe to share across tasks; all access goes through one mutex
//!
//! `CacheStore` can persist a snapshot to disk so summaries survive restarts.

mod storage;

pub use storage::{CacheStore, DEFAULT_CACHE_PATH, StorageError};

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, trace};

/// One cached value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Cache key (URL, or URL plus context hash)
    pub key: String,

    /// Cached summary text
    pub value: String,

    /// When the value was written
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Whether the entry is still valid at `now`
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => now.signed_duration_since(self.stored_at) < ttl,
            // TTL beyond chrono's range never expires
            Err(_) => true,
        }
    }

    fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.stored_at)
            .to_std()
            .unwrap_or_default()
    }
}

/// Snapshot of cache occupancy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of valid entries
    pub size: usize,

    /// Age of the oldest valid entry
    pub oldest_entry_age: Option<Duration>,
}

/// Build the cache key for a URL.
///
/// Context-free summaries are keyed by URL alone. When the summary depends on
/// the task text, the key carries a short SHA-256 of that text.
pub fn cache_key(url: &str, context: Option<&str>) -> String {
    let url = url.trim();
    match context {
        Some(context) => {
            let digest = Sha256::digest(context.trim().as_bytes());
            format!("{}#ctx={}", url, &hex::encode(digest)[..16])
        }
        None => url.to_string(),
    }
}

/// TTL cache for extracted summaries
#[derive(Debug)]
pub struct ContentCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
    enabled: bool,
}

impl ContentCache {
    /// Create an enabled cache with the given TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            enabled: true,
        }
    }

    /// Create a cache that never stores anything
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new(Duration::ZERO)
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read a value if present and unexpired
    pub fn get(&self, key: &str) -> Option<String> {
        self.get_at(key, Utc::now())
    }

    /// Read a value as of `now`
    pub fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<String> {
        if !self.enabled {
            return None;
        }
        let entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.is_fresh(self.ttl, now) => {
                trace!("Cache hit for {}", key);
                Some(entry.value.clone())
            }
            Some(_) => {
                debug!("Cache entry for {} has expired", key);
                None
            }
            None => None,
        }
    }

    /// Store a value, replacing any previous entry
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.insert(CacheEntry {
            key: key.into(),
            value: value.into(),
            stored_at: Utc::now(),
        });
    }

    /// Store an entry with its own timestamp
    pub fn insert(&self, entry: CacheEntry) {
        if !self.enabled {
            return;
        }
        self.lock().insert(entry.key.clone(), entry);
    }

    /// Remove every entry
    pub fn clear(&self) {
        let mut entries = self.lock();
        debug!("Clearing {} cache entries", entries.len());
        entries.clear();
    }

    /// Drop expired entries, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(self.ttl, now));
        before - entries.len()
    }

    /// Occupancy statistics over valid entries
    pub fn stats(&self) -> CacheStats {
        self.stats_at(Utc::now())
    }

    /// Occupancy statistics as of `now`
    pub fn stats_at(&self, now: DateTime<Utc>) -> CacheStats {
        let entries = self.lock();
        let fresh: Vec<&CacheEntry> = entries
            .values()
            .filter(|entry| entry.is_fresh(self.ttl, now))
            .collect();
        CacheStats {
            size: fresh.len(),
            oldest_entry_age: fresh.iter().map(|entry| entry.age(now)).max(),
        }
    }

    /// Valid entries, oldest first
    pub fn snapshot(&self) -> Vec<CacheEntry> {
        let now = Utc::now();
        let mut fresh: Vec<CacheEntry> = self
            .lock()
            .values()
            .filter(|entry| entry.is_fresh(self.ttl, now))
            .cloned()
            .collect();
        fresh.sort_by_key(|entry| entry.stored_at);
        fresh
    }

    /// Load entries from a snapshot, skipping expired ones.
    /// Returns how many were loaded.
    pub fn restore(&self, entries: impl IntoIterator<Item = CacheEntry>) -> usize {
        let now = Utc::now();
        let mut loaded = 0;
        for entry in entries {
            if entry.is_fresh(self.ttl, now) {
                self.insert(entry);
                loaded += 1;
            }
        }
        loaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_within_ttl() {
        let cache = ContentCache::new(Duration::from_secs(60));
        cache.set("https://a.com", "summary X");
        assert_eq!(cache.get("https://a.com").as_deref(), Some("summary X"));
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let cache = ContentCache::new(Duration::from_secs(60));
        cache.set("https://a.com", "summary X");

        let later = Utc::now() + chrono::Duration::seconds(61);
        assert_eq!(cache.get_at("https://a.com", later), None);

        // Lazy expiry: still stored until purged
        assert_eq!(cache.lock().len(), 1);
        assert_eq!(cache.stats_at(later).size, 0);
    }

    #[test]
    fn test_zero_ttl_never_hits() {
        let cache = ContentCache::new(Duration::ZERO);
        cache.set("k", "v");
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_last_writer_wins() {
        let cache = ContentCache::new(Duration::from_secs(60));
        cache.set("k", "first");
        cache.set("k", "second");
        assert_eq!(cache.get("k").as_deref(), Some("second"));
        assert_eq!(cache.stats().size, 1);
    }

    #[test]
    fn test_disabled_cache_stores_nothing() {
        let cache = ContentCache::disabled();
        cache.set("k", "v");
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn test_stats_and_clear() {
        let cache = ContentCache::new(Duration::from_secs(3600));
        let now = Utc::now();
        cache.insert(CacheEntry {
            key: "old".into(),
            value: "a".into(),
            stored_at: now - chrono::Duration::seconds(120),
        });
        cache.insert(CacheEntry {
            key: "new".into(),
            value: "b".into(),
            stored_at: now - chrono::Duration::seconds(5),
        });

        let stats = cache.stats_at(now);
        assert_eq!(stats.size, 2);
        assert_eq!(stats.oldest_entry_age, Some(Duration::from_secs(120)));

        cache.clear();
        assert_eq!(
            cache.stats(),
            CacheStats {
                size: 0,
                oldest_entry_age: None
            }
        );
    }

    #[test]
    fn test_purge_and_restore_skip_expired() {
        let cache = ContentCache::new(Duration::from_secs(60));
        let now = Utc::now();
        let stale = CacheEntry {
            key: "stale".into(),
            value: "x".into(),
            stored_at: now - chrono::Duration::seconds(600),
        };
        let fresh = CacheEntry {
            key: "fresh".into(),
            value: "y".into(),
            stored_at: now,
        };

        assert_eq!(cache.restore(vec![stale.clone(), fresh]), 1);
        cache.insert(stale);
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.snapshot().len(), 1);
    }

    #[test]
    fn test_cache_key() {
        assert_eq!(cache_key(" https://a.com ", None), "https://a.com");
        let a = cache_key("https://a.com", Some("read this"));
        let b = cache_key("https://a.com", Some("something else"));
        assert!(a.starts_with("https://a.com#ctx="));
        assert_eq!(a.len(), "https://a.com#ctx=".len() + 16);
        assert_ne!(a, b);
        assert_eq!(a, cache_key("https://a.com", Some("read this")));
    }

    #[tokio::test]
    async fn test_concurrent_writers() {
        let cache = std::sync::Arc::new(ContentCache::new(Duration::from_secs(60)));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.set(format!("k{}", i), "v") })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(cache.stats().size, 8);
    }
}
