//! In-memory implementation of `Cache` and `CacheManager`.
//!
//! `MemoryCacheManager` hands out one `MemoryCache` per (name, value type)
//! pair and keeps handing out the same one, so two realms asking for the
//! same name share entries. Entries live until they are removed or the cache
//! is cleared; there is no eviction.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    fmt,
    sync::Arc,
};

use parking_lot::RwLock;
use tracing::debug;

use castellan_contracts::error::RealmResult;
use castellan_core::traits::{Cache, CacheKey, CacheManager};

// ── MemoryCache ───────────────────────────────────────────────────────────────

/// A named map of cached values behind a read/write lock.
///
/// Reads take the shared lock, `put`/`remove`/`clear` the exclusive one.
/// Each operation is atomic for its key; nothing more is promised.
pub struct MemoryCache<V> {
    name: String,
    entries: RwLock<HashMap<CacheKey, V>>,
}

impl<V> MemoryCache<V> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn contains_key(&self, key: &CacheKey) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl<V> fmt::Debug for MemoryCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCache")
            .field("name", &self.name)
            .field("len", &self.len())
            .finish()
    }
}

impl<V> Cache<V> for MemoryCache<V>
where
    V: Clone + Send + Sync,
{
    fn get(&self, key: &CacheKey) -> RealmResult<Option<V>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn put(&self, key: CacheKey, value: V) -> RealmResult<()> {
        self.entries.write().insert(key, value);
        Ok(())
    }

    fn remove(&self, key: &CacheKey) -> RealmResult<Option<V>> {
        Ok(self.entries.write().remove(key))
    }
}

// ── Type-erased storage ───────────────────────────────────────────────────────

/// What the manager needs from a cache without knowing its value type.
trait StoredCache: Send + Sync {
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
    fn clear(&self);
    fn len(&self) -> usize;
}

impl<V> StoredCache for MemoryCache<V>
where
    V: Send + Sync + 'static,
{
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn clear(&self) {
        MemoryCache::clear(self);
    }

    fn len(&self) -> usize {
        MemoryCache::len(self)
    }
}

// ── MemoryCacheManager ────────────────────────────────────────────────────────

/// Creates `MemoryCache`s on demand and remembers them by name.
///
/// One manager serves every value type; a name asked for with two value
/// types yields two separate caches. Share it between realms as an
/// `Arc<MemoryCacheManager>`.
#[derive(Default)]
pub struct MemoryCacheManager {
    caches: RwLock<HashMap<(String, TypeId), Arc<dyn StoredCache>>>,
}

impl MemoryCacheManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// The typed cache called `name`, created on first request.
    pub fn cache<V>(&self, name: &str) -> Arc<MemoryCache<V>>
    where
        V: Clone + Send + Sync + 'static,
    {
        let key = (name.to_string(), TypeId::of::<V>());

        if let Some(existing) = self.caches.read().get(&key).cloned() {
            if let Ok(cache) = existing.as_any_arc().downcast::<MemoryCache<V>>() {
                return cache;
            }
        }

        let mut caches = self.caches.write();
        // Another thread may have created it between the two locks.
        if let Some(existing) = caches.get(&key).cloned() {
            if let Ok(cache) = existing.as_any_arc().downcast::<MemoryCache<V>>() {
                return cache;
            }
        }
        debug!(cache = %name, "creating in-memory cache");
        let cache = Arc::new(MemoryCache::<V>::new(name));
        caches.insert(key, cache.clone());
        cache
    }

    /// Names of every cache created so far, sorted and deduplicated.
    pub fn cache_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.caches.read().keys().map(|(name, _)| name.clone()).collect();
        names.sort();
        names.dedup();
        names
    }

    /// Total number of entries across every cache.
    pub fn total_entries(&self) -> usize {
        self.caches.read().values().map(|cache| cache.len()).sum()
    }

    /// Empty every cache. The caches themselves stay registered.
    pub fn clear(&self) {
        for cache in self.caches.read().values() {
            cache.clear();
        }
    }
}

impl fmt::Debug for MemoryCacheManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCacheManager")
            .field("caches", &self.cache_names())
            .finish()
    }
}

impl<V> CacheManager<V> for MemoryCacheManager
where
    V: Clone + Send + Sync + 'static,
{
    fn get_cache(&self, name: &str) -> Arc<dyn Cache<V>> {
        self.cache::<V>(name)
    }
}
