//! Time-bounded cache of search results.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::PageMatch;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    seed_url: String,
    term: String,
}

impl CacheKey {
    fn new(seed_url: &str, term: &str) -> Self {
        Self {
            seed_url: seed_url.trim().to_string(),
            term: term.trim().to_string(),
        }
    }
}

#[derive(Debug)]
struct CacheEntry {
    created_at: Instant,
    value: Arc<[PageMatch]>,
}

/// Results keyed by (seed URL, term), expiring after a fixed TTL.
///
/// All access goes through one lock and entries are immutable once stored,
/// so a reader sees either a complete entry or none at all.
#[derive(Debug)]
pub struct ResultCache {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
    ttl: Duration,
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns cached results. Expired entries are removed and reported as absent.
    pub async fn get(&self, seed_url: &str, term: &str) -> Option<Arc<[PageMatch]>> {
        let key = CacheKey::new(seed_url, term);
        let mut entries = self.entries.lock().await;
        let entry = entries.get(&key)?;
        if entry.created_at.elapsed() >= self.ttl {
            debug!("Cache entry for {} / {} expired", key.seed_url, key.term);
            entries.remove(&key);
            return None;
        }
        Some(Arc::clone(&entry.value))
    }

    /// Stores results, replacing any previous entry for the key.
    pub async fn put(&self, seed_url: &str, term: &str, results: Vec<PageMatch>) {
        let key = CacheKey::new(seed_url, term);
        let entry = CacheEntry {
            created_at: Instant::now(),
            value: results.into(),
        };
        self.entries.lock().await.insert(key, entry);
    }

    /// Removes all expired entries and returns how many were dropped.
    pub async fn sweep(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.created_at.elapsed() < self.ttl);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<PageMatch> {
        vec![
            PageMatch::new("https://a.test/", "A", "needle here", 2),
            PageMatch::new("https://a.test/b", "B", "a needle", 1),
        ]
    }

    #[tokio::test]
    async fn test_cache_miss() {
        let cache = ResultCache::new(Duration::from_secs(60));
        assert!(cache.get("https://a.test/", "needle").await.is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_cache_put_then_get() {
        let cache = ResultCache::new(Duration::from_secs(60));
        cache.put("https://a.test/", "needle", sample()).await;

        let hit = cache.get("https://a.test/", "needle").await.unwrap();
        assert_eq!(hit.to_vec(), sample());
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_cache_key_is_seed_and_term() {
        let cache = ResultCache::new(Duration::from_secs(60));
        cache.put("https://a.test/", "needle", sample()).await;

        assert!(cache.get("https://a.test/", "other").await.is_none());
        assert!(cache.get("https://b.test/", "needle").await.is_none());
        assert!(cache.get(" https://a.test/ ", " needle ").await.is_some());
    }

    #[tokio::test]
    async fn test_cache_put_replaces() {
        let cache = ResultCache::new(Duration::from_secs(60));
        cache.put("https://a.test/", "needle", sample()).await;
        cache.put("https://a.test/", "needle", Vec::new()).await;
        assert!(cache.get("https://a.test/", "needle").await.unwrap().is_empty());
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_expired_entry_removed_on_get() {
        let cache = ResultCache::new(Duration::from_secs(3600));
        cache.put("https://a.test/", "needle", sample()).await;

        tokio::time::advance(Duration::from_secs(3599)).await;
        assert!(cache.get("https://a.test/", "needle").await.is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get("https://a.test/", "needle").await.is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_sweep_removes_only_expired() {
        let cache = ResultCache::new(Duration::from_secs(10));
        cache.put("https://a.test/", "old", sample()).await;
        tokio::time::advance(Duration::from_secs(6)).await;
        cache.put("https://a.test/", "new", sample()).await;
        tokio::time::advance(Duration::from_secs(6)).await;

        assert_eq!(cache.sweep().await, 1);
        assert_eq!(cache.len().await, 1);
        assert!(cache.get("https://a.test/", "new").await.is_some());
    }
}
