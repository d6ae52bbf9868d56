//! # castellan-cache
//!
//! In-process cache collaborator for Castellan realms.
//!
//! ## Overview
//!
//! [`MemoryCacheManager`] implements `CacheManager<V>` for every cloneable
//! value type, so one shared manager serves both the authentication and the
//! authorization caches of any number of realms. Caches are created on first
//! request and the same instance is returned for the same name afterwards.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use castellan_cache::MemoryCacheManager;
//!
//! let caches = Arc::new(MemoryCacheManager::new());
//! let realm = StandardRealm::builder("corporate")
//!     .cache_manager(caches.clone())
//!     .build()?;
//! ```

pub mod memory;

pub use memory::{MemoryCache, MemoryCacheManager};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use castellan_contracts::{
        principal::PrincipalSet,
        record::{AuthenticationRecord, AuthorizationRecord},
    };
    use castellan_core::traits::{Cache, CacheKey, CacheManager, RealmCacheManager};

    use super::{MemoryCache, MemoryCacheManager};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn key(user: &str) -> CacheKey {
        CacheKey::Principals(PrincipalSet::of_principal(user, "test"))
    }

    // ── Tests ─────────────────────────────────────────────────────────────────

    /// put / get / remove behave like a map.
    #[test]
    fn test_cache_round_trip() {
        let cache: MemoryCache<u32> = MemoryCache::new("numbers");

        assert_eq!(cache.get(&key("alice")).unwrap(), None);
        cache.put(key("alice"), 7).unwrap();
        assert_eq!(cache.get(&key("alice")).unwrap(), Some(7));
        assert_eq!(cache.len(), 1);

        assert_eq!(cache.remove(&key("alice")).unwrap(), Some(7));
        assert_eq!(cache.remove(&key("alice")).unwrap(), None);
        assert!(cache.is_empty());
    }

    /// Structurally equal principal sets address the same entry.
    #[test]
    fn test_equal_principal_sets_share_entry() {
        let cache: MemoryCache<&'static str> = MemoryCache::new("records");
        let a = PrincipalSet::of_realm("test", ["alice", "admin"]);
        let b = PrincipalSet::builder()
            .add_principal("test", "admin")
            .add_principal("test", "alice")
            .build();

        cache.put(CacheKey::Principals(a), "record").unwrap();
        assert_eq!(cache.get(&CacheKey::Principals(b)).unwrap(), Some("record"));
    }

    /// The manager returns the same cache for the same name.
    #[test]
    fn test_manager_is_idempotent_per_name() {
        let manager = MemoryCacheManager::new();

        let first: Arc<dyn Cache<u32>> = manager.get_cache("shared");
        let second: Arc<dyn Cache<u32>> = manager.get_cache("shared");
        first.put(key("alice"), 1).unwrap();

        assert_eq!(second.get(&key("alice")).unwrap(), Some(1));
        assert_eq!(manager.cache_names(), vec!["shared".to_string()]);

        let other: Arc<dyn Cache<u32>> = manager.get_cache("other");
        assert_eq!(other.get(&key("alice")).unwrap(), None);
    }

    /// One name asked for with two value types yields two independent caches.
    #[test]
    fn test_value_types_are_kept_apart() {
        let manager = MemoryCacheManager::new();

        let authc: Arc<dyn Cache<Arc<AuthenticationRecord>>> = manager.get_cache("realm");
        let authz: Arc<dyn Cache<Arc<AuthorizationRecord>>> = manager.get_cache("realm");

        authz
            .put(key("alice"), Arc::new(AuthorizationRecord::new().with_role("admin")))
            .unwrap();

        assert!(authc.get(&key("alice")).unwrap().is_none());
        assert!(authz.get(&key("alice")).unwrap().unwrap().has_role("admin"));
        assert_eq!(manager.total_entries(), 1);
    }

    /// `clear` empties every cache but keeps them registered.
    #[test]
    fn test_manager_clear() {
        let manager = MemoryCacheManager::new();
        manager.cache::<u32>("a").put(key("x"), 1).unwrap();
        manager.cache::<String>("b").put(key("y"), "v".to_string()).unwrap();
        assert_eq!(manager.total_entries(), 2);

        manager.clear();

        assert_eq!(manager.total_entries(), 0);
        assert_eq!(manager.cache_names(), vec!["a".to_string(), "b".to_string()]);
    }

    /// The manager serves as a realm cache manager through a trait object.
    #[test]
    fn test_usable_as_realm_cache_manager() {
        let manager: Arc<dyn RealmCacheManager> = Arc::new(MemoryCacheManager::new());
        let cache = CacheManager::<Arc<AuthorizationRecord>>::get_cache(manager.as_ref(), "x.authorizationCache");
        cache.put(key("alice"), Arc::new(AuthorizationRecord::new())).unwrap();
        assert!(cache.get(&key("alice")).unwrap().is_some());
    }

    /// Concurrent first requests for a name agree on one cache.
    #[test]
    fn test_concurrent_creation_yields_one_cache() {
        let manager = Arc::new(MemoryCacheManager::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let manager = manager.clone();
                std::thread::spawn(move || {
                    manager.cache::<usize>("race").put(key(&format!("u{i}")), i).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(manager.cache::<usize>("race").len(), 8);
    }
}
