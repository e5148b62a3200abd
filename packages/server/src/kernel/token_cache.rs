use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::RwLock;

struct CacheEntry<V> {
    value: V,
    cached_at: DateTime<Utc>,
}

/// Time-bounded memoization of expensive external lookups (resolved gateway
/// credentials, third-party auth tokens).
///
/// Injectable and reset-able, so tests can substitute or clear it; entries
/// expire after the configured TTL.
pub struct TokenCache<K, V> {
    entries: Arc<RwLock<HashMap<K, CacheEntry<V>>>>,
    ttl: Duration,
}

impl<K, V> TokenCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Get a cached value, or None if absent or expired
    pub async fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;

        let elapsed = Utc::now().signed_duration_since(entry.cached_at);
        if elapsed >= self.ttl {
            return None;
        }

        Some(entry.value.clone())
    }

    pub async fn insert(&self, key: K, value: V) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key,
            CacheEntry {
                value,
                cached_at: Utc::now(),
            },
        );
    }

    /// Drop every entry (test reset)
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Drop expired entries (run periodically)
    pub async fn cleanup_expired(&self) {
        let mut entries = self.entries.write().await;
        let now = Utc::now();

        entries.retain(|_, entry| now.signed_duration_since(entry.cached_at) < self.ttl);
    }
}

impl<K, V> Clone for TokenCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            ttl: self.ttl,
        }
    }
}
