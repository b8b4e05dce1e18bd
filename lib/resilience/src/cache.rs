//! TTL cache for store reads

use ahash::AHashMap;
use fusegraph_core::metrics::hit_rate;
use fusegraph_core::tenant::tenant_key;
use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Deterministic key for `operation` over `params`, scoped to `tenant`.
///
/// The tenant stays readable as a key prefix so a tenant's entries can be
/// dropped together.
pub fn cache_key(operation: &str, params: &serde_json::Value, tenant: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(operation.as_bytes());
    hasher.update([0u8]);
    hasher.update(params.to_string().as_bytes());
    let digest = hasher.finalize();

    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }
    tenant_key(tenant, &hex)
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub entries: usize,
}

/// Invalidation counters. A read started under one generation must not be
/// cached once a later invalidation could have removed it.
#[derive(Debug, Default)]
struct Generations {
    // every invalidation; unscoped keys are visible to all tenants
    any: u64,
    // full clears
    cleared: u64,
    tenants: AHashMap<String, u64>,
}

impl Generations {
    fn of(&self, tenant: Option<&str>) -> u64 {
        match tenant {
            Some(tenant) => self.cleared + self.tenants.get(tenant).copied().unwrap_or(0),
            None => self.any,
        }
    }

    fn bump(&mut self, tenant: Option<&str>) {
        self.any += 1;
        match tenant {
            Some(tenant) => *self.tenants.entry(tenant.to_string()).or_default() += 1,
            None => self.cleared += 1,
        }
    }
}

#[derive(Debug)]
pub struct TtlCache<V> {
    entries: Mutex<AHashMap<String, CacheEntry<V>>>,
    // always locked after `entries`
    generations: Mutex<Generations>,
    ttl: Duration,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(AHashMap::new()),
            generations: Mutex::new(Generations::default()),
            ttl,
            capacity: capacity.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Live value for `key`. An entry whose age has reached the TTL counts as
    /// a miss and is evicted.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        let fresh = match entries.get(key) {
            Some(entry) if now.duration_since(entry.inserted_at) < self.ttl => {
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        };
        drop(entries);

        match &fresh {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        fresh
    }

    /// Token to pass to [`insert_if_current`](Self::insert_if_current) for a
    /// read scoped to `tenant`
    pub fn generation(&self, tenant: Option<&str>) -> u64 {
        self.generations.lock().of(tenant)
    }

    pub fn insert(&self, key: String, value: V) {
        let mut entries = self.entries.lock();
        Self::put(&mut entries, key, value, self.ttl, self.capacity);
    }

    /// Insert unless `tenant`'s entries were invalidated since `generation`
    /// was taken. Returns whether the value was stored.
    pub fn insert_if_current(
        &self,
        key: String,
        value: V,
        tenant: Option<&str>,
        generation: u64,
    ) -> bool {
        let mut entries = self.entries.lock();
        if self.generations.lock().of(tenant) != generation {
            debug!(
                tenant = tenant.unwrap_or("<global>"),
                "skipped caching a read that raced an invalidation"
            );
            return false;
        }
        Self::put(&mut entries, key, value, self.ttl, self.capacity);
        true
    }

    fn put(
        entries: &mut AHashMap<String, CacheEntry<V>>,
        key: String,
        value: V,
        ttl: Duration,
        capacity: usize,
    ) {
        let now = Instant::now();
        if entries.len() >= capacity && !entries.contains_key(&key) {
            entries.retain(|_, e| now.duration_since(e.inserted_at) < ttl);
            if entries.len() >= capacity {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, e)| e.inserted_at)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    entries.remove(&oldest);
                }
            }
        }
        entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: now,
            },
        );
    }

    /// Drop entries visible to `tenant`: its own plus unscoped ones.
    /// `None` clears everything.
    pub fn invalidate_tenant(&self, tenant: Option<&str>) {
        let mut entries = self.entries.lock();
        let before = entries.len();
        match tenant {
            Some(tenant) => {
                let prefix = format!("{tenant}:");
                entries.retain(|k, _| k.contains(':') && !k.starts_with(&prefix));
            }
            None => entries.clear(),
        }
        self.generations.lock().bump(tenant);
        debug!(
            tenant = tenant.unwrap_or("<global>"),
            evicted = before - entries.len(),
            "cache invalidated"
        );
    }

    pub fn clear(&self) {
        self.invalidate_tenant(None);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        CacheStats {
            hits,
            misses,
            hit_rate: hit_rate(hits, misses),
            entries: self.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_deterministic_and_scoped() {
        let params = json!({"k": 5, "type": "Person"});
        let a = cache_key("vector_search", &params, Some("t1"));
        assert_eq!(a, cache_key("vector_search", &params, Some("t1")));
        assert!(a.starts_with("t1:"));
        assert_ne!(a, cache_key("vector_search", &params, Some("t2")));
        assert_ne!(a, cache_key("traverse", &params, Some("t1")));
        assert!(!cache_key("vector_search", &params, None).contains(':'));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_at_ttl() {
        let cache = TtlCache::new(Duration::from_secs(10), 16);
        cache.insert("k".to_string(), 42);

        tokio::time::advance(Duration::from_millis(9_999)).await;
        assert_eq!(cache.get("k"), Some(42));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
        assert!((stats.hit_rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_hit_rate_zero_without_requests() {
        let cache: TtlCache<u8> = TtlCache::new(Duration::from_secs(1), 4);
        assert_eq!(cache.stats().hit_rate, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_evicts_oldest() {
        let cache = TtlCache::new(Duration::from_secs(60), 2);
        cache.insert("a".to_string(), 1);
        tokio::time::advance(Duration::from_millis(1)).await;
        cache.insert("b".to_string(), 2);
        tokio::time::advance(Duration::from_millis(1)).await;
        cache.insert("c".to_string(), 3);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("c"), Some(3));
    }

    #[test]
    fn test_invalidate_tenant() {
        let cache = TtlCache::new(Duration::from_secs(60), 16);
        cache.insert("t1:x".to_string(), 1);
        cache.insert("t2:x".to_string(), 2);
        cache.insert("global".to_string(), 3);

        cache.invalidate_tenant(Some("t1"));
        assert_eq!(cache.get("t2:x"), Some(2));
        assert_eq!(cache.get("t1:x"), None);
        assert_eq!(cache.get("global"), None);

        cache.invalidate_tenant(None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_read_racing_invalidation_not_cached() {
        let cache = TtlCache::new(Duration::from_secs(60), 16);
        let t1 = cache.generation(Some("t1"));
        let t2 = cache.generation(Some("t2"));
        let unscoped = cache.generation(None);

        cache.invalidate_tenant(Some("t1"));
        assert!(!cache.insert_if_current("t1:x".to_string(), 1, Some("t1"), t1));
        assert!(!cache.insert_if_current("global".to_string(), 3, None, unscoped));
        assert!(cache.insert_if_current("t2:x".to_string(), 2, Some("t2"), t2));
        assert_eq!(cache.get("t1:x"), None);
        assert_eq!(cache.get("t2:x"), Some(2));

        let t2 = cache.generation(Some("t2"));
        cache.clear();
        assert!(!cache.insert_if_current("t2:x".to_string(), 2, Some("t2"), t2));
        assert!(cache.is_empty());
    }
}
