use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use habits_store::TokenRecord;

struct CacheEntry {
    record: TokenRecord,
    inserted_at: Instant,
}

/// In-memory cache for user → refresh-token records with TTL.
///
/// Sits in front of the repository as a write-through layer: callers write
/// to persistence first and mirror here, and repopulate on a store hit.
pub struct TokenCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl TokenCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Get the cached record for a user. Returns None if expired or missing.
    pub fn get(&self, user_id: &str) -> Option<TokenRecord> {
        let entries = self.entries.read().unwrap();
        entries.get(user_id).and_then(|entry| {
            if entry.inserted_at.elapsed() < self.ttl {
                Some(entry.record.clone())
            } else {
                None
            }
        })
    }

    pub fn put(&self, user_id: &str, record: TokenRecord) {
        self.entries.write().unwrap().insert(
            user_id.to_string(),
            CacheEntry {
                record,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn remove(&self, user_id: &str) {
        self.entries.write().unwrap().remove(user_id);
    }

    /// Evict expired entries. Called by the janitor once a minute.
    pub fn sweep(&self) {
        let ttl = self.ttl;
        self.entries
            .write()
            .unwrap()
            .retain(|_, entry| entry.inserted_at.elapsed() < ttl);
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(tag: &str) -> TokenRecord {
        TokenRecord {
            access_token: format!("at-{tag}"),
            refresh_token: format!("rt-{tag}"),
            id_token: format!("it-{tag}"),
            expiry: 0,
        }
    }

    #[test]
    fn test_put_get_remove() {
        let cache = TokenCache::new(Duration::from_secs(60));
        assert!(cache.get("u").is_none());

        cache.put("u", record("1"));
        assert_eq!(cache.get("u").unwrap().refresh_token, "rt-1");

        cache.remove("u");
        assert!(cache.get("u").is_none());
    }

    #[test]
    fn test_expired_entries_read_as_missing() {
        let cache = TokenCache::new(Duration::ZERO);
        cache.put("u", record("1"));
        assert!(cache.get("u").is_none());
        // Still occupies a slot until the janitor runs.
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_sweep_evicts_expired() {
        let cache = TokenCache::new(Duration::ZERO);
        cache.put("u", record("1"));
        cache.sweep();
        assert!(cache.is_empty());
    }
}
