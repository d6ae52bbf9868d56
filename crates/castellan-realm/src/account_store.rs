//! `AccountStoreRealm`: a realm over one external account store.
//!
//! The store answers `lookup(token)`; the realm wraps that in the engine's
//! cache-check → fetch → cache-store routine and always matches the submitted
//! credential against the record afterwards, cached or not. A record held in
//! the account cache is never handed back on the strength of the cache alone.

use std::{fmt, ops::Deref, sync::Arc};

use tracing::debug;

use castellan_contracts::{
    error::RealmResult,
    principal::PrincipalSet,
    record::{AuthenticationRecord, AuthorizationRecord},
    token::{AuthenticationToken, TokenKind},
};
use castellan_core::{
    realm::{PrincipalsKeyResolver, StandardRealm, TokenKeyResolver},
    traits::{
        AccountStore, AuthenticationCache, Authorizer, CacheKey, CredentialsMatcher, PermissionResolver, Realm,
        RealmCacheManager, RolePermissionResolver,
    },
};
use castellan_credential::SimpleCredentialsMatcher;
use castellan_permission::WildcardPermissionResolver;

/// Suffix of the default account cache name.
pub const ACCOUNT_CACHE_SUFFIX: &str = ".accountCache";

/// A realm whose accounts live in an [`AccountStore`].
///
/// Dereferences to the underlying [`StandardRealm`] for cache maintenance
/// and the decision surface.
pub struct AccountStoreRealm {
    realm: StandardRealm,
    store: Arc<dyn AccountStore>,
}

impl AccountStoreRealm {
    pub fn builder(name: impl Into<String>, store: Arc<dyn AccountStore>) -> AccountStoreRealmBuilder {
        AccountStoreRealmBuilder::new(name, store)
    }

    pub fn store(&self) -> &Arc<dyn AccountStore> {
        &self.store
    }

    /// Name of the cache authentication records are kept in.
    pub fn account_cache_name(&self) -> &str {
        self.realm.authentication_cache_name()
    }
}

impl Deref for AccountStoreRealm {
    type Target = StandardRealm;

    fn deref(&self) -> &StandardRealm {
        &self.realm
    }
}

impl fmt::Debug for AccountStoreRealm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountStoreRealm")
            .field("realm", &self.realm)
            .finish_non_exhaustive()
    }
}

impl Realm for AccountStoreRealm {
    fn name(&self) -> &str {
        self.realm.name()
    }

    fn supports(&self, token: &AuthenticationToken) -> bool {
        self.realm.supports(token)
    }

    fn authenticate(&self, token: &AuthenticationToken) -> RealmResult<Option<AuthenticationRecord>> {
        self.realm.authenticate(token)
    }

    fn on_logout(&self, principals: &PrincipalSet) -> RealmResult<()> {
        self.realm.on_logout(principals)
    }

    fn as_authorizer(&self) -> Option<&dyn Authorizer> {
        Some(&self.realm)
    }
}

// ── Builder ───────────────────────────────────────────────────────────────────

/// Configures an [`AccountStoreRealm`].
///
/// Defaults: username/password tokens, the simple credentials matcher, the
/// wildcard permission resolver, account caching on (effective once a cache
/// or cache manager is supplied) and authorization caching on.
pub struct AccountStoreRealmBuilder {
    name: String,
    store: Arc<dyn AccountStore>,
    supported_tokens: Vec<TokenKind>,
    credentials_matcher: Arc<dyn CredentialsMatcher>,
    permission_resolver: Arc<dyn PermissionResolver>,
    role_permission_resolver: Option<Arc<dyn RolePermissionResolver>>,
    cache_manager: Option<Arc<dyn RealmCacheManager>>,
    account_caching: bool,
    account_cache: Option<Arc<AuthenticationCache>>,
    account_cache_name: Option<String>,
    account_cache_key: Option<TokenKeyResolver>,
    account_logout_key: Option<PrincipalsKeyResolver>,
    authorization_caching: bool,
}

impl AccountStoreRealmBuilder {
    fn new(name: impl Into<String>, store: Arc<dyn AccountStore>) -> Self {
        Self {
            name: name.into(),
            store,
            supported_tokens: vec![TokenKind::UsernamePassword],
            credentials_matcher: Arc::new(SimpleCredentialsMatcher::new()),
            permission_resolver: Arc::new(WildcardPermissionResolver::new()),
            role_permission_resolver: None,
            cache_manager: None,
            account_caching: true,
            account_cache: None,
            account_cache_name: None,
            account_cache_key: None,
            account_logout_key: None,
            authorization_caching: true,
        }
    }

    pub fn supported_tokens(mut self, kinds: impl IntoIterator<Item = TokenKind>) -> Self {
        self.supported_tokens = kinds.into_iter().collect();
        self
    }

    pub fn credentials_matcher(mut self, matcher: Arc<dyn CredentialsMatcher>) -> Self {
        self.credentials_matcher = matcher;
        self
    }

    pub fn permission_resolver(mut self, resolver: Arc<dyn PermissionResolver>) -> Self {
        self.permission_resolver = resolver;
        self
    }

    pub fn role_permission_resolver(mut self, resolver: Arc<dyn RolePermissionResolver>) -> Self {
        self.role_permission_resolver = Some(resolver);
        self
    }

    pub fn cache_manager(mut self, manager: Arc<dyn RealmCacheManager>) -> Self {
        self.cache_manager = Some(manager);
        self
    }

    pub fn account_caching(mut self, enabled: bool) -> Self {
        self.account_caching = enabled;
        self
    }

    /// Keep authentication records in this cache. Enables account caching.
    pub fn account_cache(mut self, cache: Arc<AuthenticationCache>) -> Self {
        self.account_cache = Some(cache);
        self.account_caching = true;
        self
    }

    pub fn account_cache_name(mut self, name: impl Into<String>) -> Self {
        self.account_cache_name = Some(name.into());
        self
    }

    /// Derive the account cache key from the token (default: its principal).
    ///
    /// Pair with [`account_logout_key`](Self::account_logout_key) so logout
    /// clears the entry this key stored.
    pub fn account_cache_key(
        mut self,
        resolver: impl Fn(&AuthenticationToken) -> Option<CacheKey> + Send + Sync + 'static,
    ) -> Self {
        self.account_cache_key = Some(Arc::new(resolver));
        self
    }

    /// The account cache key cleared on logout for a principal set
    /// (default: the realm's available principal).
    pub fn account_logout_key(
        mut self,
        resolver: impl Fn(&PrincipalSet) -> Option<CacheKey> + Send + Sync + 'static,
    ) -> Self {
        self.account_logout_key = Some(Arc::new(resolver));
        self
    }

    pub fn authorization_caching(mut self, enabled: bool) -> Self {
        self.authorization_caching = enabled;
        self
    }

    /// Validate and produce the realm.
    ///
    /// # Errors
    ///
    /// `RealmError::ConfigError` if the name is blank.
    pub fn build(self) -> RealmResult<AccountStoreRealm> {
        let account_cache_name = self
            .account_cache_name
            .unwrap_or_else(|| format!("{}{}", self.name, ACCOUNT_CACHE_SUFFIX));

        let authn_store = Arc::clone(&self.store);
        let authz_store = Arc::clone(&self.store);

        let mut builder = StandardRealm::builder(self.name)
            .supported_tokens(self.supported_tokens)
            .authentication_lookup(
                move |token: &AuthenticationToken| -> RealmResult<Option<AuthenticationRecord>> {
                    Ok(authn_store.lookup(token)?.map(|account| {
                        debug!(principals = %account.principals(), "acquired account from account store");
                        account.authentication_record()
                    }))
                },
            )
            .authorization_lookup(
                move |principals: &PrincipalSet| -> RealmResult<Option<AuthorizationRecord>> {
                    authz_store.authorization(principals)
                },
            )
            .credentials_matcher(self.credentials_matcher)
            .permission_resolver(self.permission_resolver)
            .authentication_caching(self.account_caching)
            .authentication_cache_name(account_cache_name)
            .authorization_caching(self.authorization_caching);

        if let Some(resolver) = self.role_permission_resolver {
            builder = builder.role_permission_resolver(resolver);
        }
        if let Some(manager) = self.cache_manager {
            builder = builder.cache_manager(manager);
        }
        if let Some(cache) = self.account_cache {
            builder = builder.authentication_cache(cache);
        }
        if let Some(key) = self.account_cache_key {
            builder = builder.authentication_cache_key(move |token: &AuthenticationToken| key(token));
        }
        if let Some(key) = self.account_logout_key {
            builder = builder.authentication_logout_key(move |principals: &PrincipalSet| key(principals));
        }

        Ok(AccountStoreRealm {
            realm: builder.build()?,
            store: self.store,
        })
    }
}
