//! Lazy cache slots held by `StandardRealm`.
//!
//! A slot resolves its cache at most once: an explicitly configured cache
//! wins; otherwise the realm's cache manager is asked for a cache by the
//! slot's name on first use and the answer is memoized. With neither, or
//! with caching switched off, the slot is empty and every call falls through
//! to the backend.

use std::sync::{Arc, OnceLock};

use tracing::debug;

use castellan_contracts::record::{AuthenticationRecord, AuthorizationRecord};

use crate::traits::{Cache, CacheManager, RealmCacheManager};

/// Record types a slot can ask a `RealmCacheManager` for.
pub(crate) trait SlotValue: Sized {
    fn cache_from(manager: &dyn RealmCacheManager, name: &str) -> Arc<dyn Cache<Self>>;
}

impl SlotValue for Arc<AuthenticationRecord> {
    fn cache_from(manager: &dyn RealmCacheManager, name: &str) -> Arc<dyn Cache<Self>> {
        CacheManager::<Self>::get_cache(manager, name)
    }
}

impl SlotValue for Arc<AuthorizationRecord> {
    fn cache_from(manager: &dyn RealmCacheManager, name: &str) -> Arc<dyn Cache<Self>> {
        CacheManager::<Self>::get_cache(manager, name)
    }
}

pub(crate) struct CacheSlot<V> {
    name: String,
    enabled: bool,
    explicit: Option<Arc<dyn Cache<V>>>,
    manager: Option<Arc<dyn RealmCacheManager>>,
    resolved: OnceLock<Option<Arc<dyn Cache<V>>>>,
}

impl<V: SlotValue> CacheSlot<V> {
    pub(crate) fn new(
        name: String,
        enabled: bool,
        explicit: Option<Arc<dyn Cache<V>>>,
        manager: Option<Arc<dyn RealmCacheManager>>,
    ) -> Self {
        Self {
            name,
            enabled,
            explicit,
            manager,
            resolved: OnceLock::new(),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// The cache to use, or `None` when caching is unavailable.
    pub(crate) fn cache(&self) -> Option<&Arc<dyn Cache<V>>> {
        if !self.enabled {
            return None;
        }
        if let Some(cache) = &self.explicit {
            return Some(cache);
        }
        self.resolved
            .get_or_init(|| {
                let manager = self.manager.as_deref()?;
                debug!(cache = %self.name, "obtaining cache from cache manager");
                Some(V::cache_from(manager, &self.name))
            })
            .as_ref()
    }
}
