//! In-process TTL cache backed by DashMap for lock-free concurrent reads.
//! Entries expire lazily: a stale entry is treated as missing on read and
//! removed at that point; nothing sweeps in the background.

use crate::{ResolutionCache, ScopeKey};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

/// Lock-free local cache for resolved configuration values.
pub struct LocalCache<V> {
    name: &'static str,
    store: DashMap<ScopeKey, CacheEntry<V>>,
    ttl: Duration,
    max_entries: usize,
    generation: AtomicU64,
    /// Held shared by conditional puts and exclusively by invalidations, so
    /// a generation check and its insert cannot straddle an invalidation.
    write_gate: RwLock<()>,
}

impl<V: Clone + Send + Sync> LocalCache<V> {
    pub fn new(name: &'static str, ttl: Duration, max_entries: usize) -> Self {
        Self {
            name,
            store: DashMap::new(),
            ttl,
            max_entries,
            generation: AtomicU64::new(0),
            write_gate: RwLock::new(()),
        }
    }

    /// Remove expired entries. Optional; reads already ignore them.
    pub fn evict_expired(&self) -> usize {
        let before = self.store.len();
        self.store
            .retain(|_, entry| entry.inserted_at.elapsed() <= self.ttl);
        before - self.store.len()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    fn insert(&self, key: ScopeKey, value: V) {
        // Over capacity: skip the insert, the next read goes to the store.
        if self.store.len() >= self.max_entries && !self.store.contains_key(&key) {
            return;
        }
        self.store.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    fn bump(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        metrics::counter!("confgate.cache.invalidate", "cache" => self.name).increment(1);
    }
}

impl<V: Clone + Send + Sync> ResolutionCache<V> for LocalCache<V> {
    fn get(&self, key: &ScopeKey) -> Option<V> {
        let fresh = self.store.get(key).and_then(|entry| {
            if entry.inserted_at.elapsed() > self.ttl {
                None
            } else {
                Some(entry.value.clone())
            }
        });

        match fresh {
            Some(value) => {
                metrics::counter!("confgate.cache.hit", "cache" => self.name).increment(1);
                debug!(cache = self.name, key = %key, "cache hit");
                Some(value)
            }
            None => {
                self.store
                    .remove_if(key, |_, entry| entry.inserted_at.elapsed() > self.ttl);
                metrics::counter!("confgate.cache.miss", "cache" => self.name).increment(1);
                None
            }
        }
    }

    fn put(&self, key: ScopeKey, value: V) {
        let _gate = self.write_gate.read();
        self.insert(key, value);
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn put_if_current(&self, key: ScopeKey, value: V, generation: u64) -> bool {
        let _gate = self.write_gate.read();
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(cache = self.name, key = %key, "skipping put after invalidation");
            return false;
        }
        self.insert(key, value);
        true
    }

    fn invalidate(&self, key: &ScopeKey) {
        let _gate = self.write_gate.write();
        self.bump();
        self.store.remove(key);
    }

    fn invalidate_prefix(&self, config_key: &str) {
        let _gate = self.write_gate.write();
        self.bump();
        self.store.retain(|k, _| k.key != config_key);
    }

    fn clear(&self) {
        let _gate = self.write_gate.write();
        self.bump();
        self.store.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confgate_core::types::TenantId;

    fn cache(ttl: Duration) -> LocalCache<Option<bool>> {
        LocalCache::new("test", ttl, 1_000)
    }

    #[test]
    fn test_put_and_get() {
        let cache = cache(Duration::from_secs(60));
        let key = ScopeKey::new("dashboard", Some(&TenantId::new("acme")));
        assert_eq!(cache.get(&key), None);

        cache.put(key.clone(), Some(true));
        assert_eq!(cache.get(&key), Some(Some(true)));
        // Negative results are cached values too.
        let missing = ScopeKey::global("unknown");
        cache.put(missing.clone(), None);
        assert_eq!(cache.get(&missing), Some(None));
    }

    #[test]
    fn test_stale_entry_reads_as_missing() {
        let cache = cache(Duration::from_millis(20));
        let key = ScopeKey::global("auth");
        cache.put(key.clone(), Some(true));
        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.get(&key), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_prefix_drops_all_tenants() {
        let cache = cache(Duration::from_secs(60));
        let a = TenantId::new("a");
        let b = TenantId::new("b");
        cache.put(ScopeKey::new("billing", Some(&a)), Some(true));
        cache.put(ScopeKey::new("billing", Some(&b)), Some(false));
        cache.put(ScopeKey::global("billing"), Some(true));
        cache.put(ScopeKey::global("auth"), Some(true));

        cache.invalidate_prefix("billing");
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&ScopeKey::global("auth")), Some(Some(true)));
    }

    #[test]
    fn test_put_if_current_rejects_after_invalidation() {
        let cache = cache(Duration::from_secs(60));
        let key = ScopeKey::global("rest_api");

        let generation = cache.generation();
        cache.invalidate(&key);
        assert!(!cache.put_if_current(key.clone(), Some(true), generation));
        assert_eq!(cache.get(&key), None);

        let generation = cache.generation();
        assert!(cache.put_if_current(key.clone(), Some(false), generation));
        assert_eq!(cache.get(&key), Some(Some(false)));
    }

    #[test]
    fn test_capacity_guard_skips_new_keys() {
        let cache: LocalCache<Option<bool>> = LocalCache::new("small", Duration::from_secs(60), 2);
        cache.put(ScopeKey::global("a"), Some(true));
        cache.put(ScopeKey::global("b"), Some(true));
        cache.put(ScopeKey::global("c"), Some(true));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&ScopeKey::global("c")), None);
        // Existing keys can still be refreshed.
        cache.put(ScopeKey::global("a"), Some(false));
        assert_eq!(cache.get(&ScopeKey::global("a")), Some(Some(false)));
    }

    #[test]
    fn test_evict_expired() {
        let cache = cache(Duration::from_millis(10));
        cache.put(ScopeKey::global("a"), Some(true));
        cache.put(ScopeKey::global("b"), Some(true));
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.evict_expired(), 2);
    }

    #[test]
    fn test_clear() {
        let cache = cache(Duration::from_secs(60));
        cache.put(ScopeKey::global("a"), Some(true));
        let generation = cache.generation();
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.generation() > generation);
    }
}
