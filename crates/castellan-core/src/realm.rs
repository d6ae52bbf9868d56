//! `StandardRealm`: the realm engine.
//!
//! One struct covers the whole realm behaviour: naming, token support,
//! cached authentication with mandatory credential verification, and the
//! permission/role decision engine over a cached authorization record. The
//! backend-specific parts are injected:
//!
//!   token ──► [authentication cache] ──► AuthenticationLookup ──► CredentialsMatcher ──► status check
//!
//!   principals ──► [authorization cache] ──► AuthorizationLookup ──► derived permission set ──► implies?
//!
//! The derived permission set is
//! `object permissions ∪ resolve(string permissions) ∪ resolve_roles(roles)`,
//! recomputed on every decision; only the record itself is cached.
//!
//! Cache fills are check-then-store and not atomic: two callers missing the
//! same key at once may both hit the backend and both store. The stored value
//! is the same either way.

use std::{collections::HashSet, fmt, sync::Arc};

use chrono::Utc;
use tracing::{debug, trace, warn};

use castellan_contracts::{
    error::{RealmError, RealmResult},
    permission::{Permission, PermissionRequest, SharedPermission},
    principal::{Principal, PrincipalSet},
    record::{AuthenticationRecord, AuthorizationRecord},
    token::{AuthenticationToken, TokenKind},
};

use crate::{
    cache::CacheSlot,
    traits::{
        permission_denied, role_denied, AuthenticationCache, AuthenticationLookup, AuthorizationCache,
        AuthorizationLookup, Authorizer, CacheKey, CredentialsMatcher, PermissionResolver, Realm,
        RealmCacheManager, RolePermissionResolver,
    },
};

/// Suffix of the default authorization cache name.
pub const AUTHORIZATION_CACHE_SUFFIX: &str = ".authorizationCache";

/// Suffix of the default authentication cache name.
pub const AUTHENTICATION_CACHE_SUFFIX: &str = ".authenticationCache";

/// Derives the authentication cache key from a submitted token.
pub type TokenKeyResolver = Arc<dyn Fn(&AuthenticationToken) -> Option<CacheKey> + Send + Sync>;

/// Derives a cache key from a principal set.
pub type PrincipalsKeyResolver = Arc<dyn Fn(&PrincipalSet) -> Option<CacheKey> + Send + Sync>;

// ── StandardRealm ─────────────────────────────────────────────────────────────

/// A realm composed of pluggable collaborators.
///
/// Build with [`StandardRealm::builder`]. Every collaborator is optional
/// except the credentials matcher, which is required once an authentication
/// lookup is configured.
pub struct StandardRealm {
    name: String,
    supported_tokens: Vec<TokenKind>,
    authentication_lookup: Option<Arc<dyn AuthenticationLookup>>,
    authorization_lookup: Option<Arc<dyn AuthorizationLookup>>,
    credentials_matcher: Option<Arc<dyn CredentialsMatcher>>,
    permission_resolver: Option<Arc<dyn PermissionResolver>>,
    role_permission_resolver: Option<Arc<dyn RolePermissionResolver>>,
    authentication_cache: CacheSlot<Arc<AuthenticationRecord>>,
    authorization_cache: CacheSlot<Arc<AuthorizationRecord>>,
    token_key: TokenKeyResolver,
    authentication_key: PrincipalsKeyResolver,
    authorization_key: PrincipalsKeyResolver,
}

impl StandardRealm {
    /// Start configuring a realm called `name`.
    pub fn builder(name: impl Into<String>) -> StandardRealmBuilder {
        StandardRealmBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn supported_tokens(&self) -> &[TokenKind] {
        &self.supported_tokens
    }

    /// Return true if `token`'s shape is one this realm was configured for.
    pub fn supports(&self, token: &AuthenticationToken) -> bool {
        self.supported_tokens.contains(&token.kind())
    }

    pub fn authorization_cache_name(&self) -> &str {
        self.authorization_cache.name()
    }

    pub fn authentication_cache_name(&self) -> &str {
        self.authentication_cache.name()
    }

    pub fn credentials_matcher(&self) -> Option<&Arc<dyn CredentialsMatcher>> {
        self.credentials_matcher.as_ref()
    }

    pub fn permission_resolver(&self) -> Option<&Arc<dyn PermissionResolver>> {
        self.permission_resolver.as_ref()
    }

    pub fn role_permission_resolver(&self) -> Option<&Arc<dyn RolePermissionResolver>> {
        self.role_permission_resolver.as_ref()
    }

    /// The principal this realm treats as authoritative in `principals`.
    ///
    /// This realm's own slice wins; otherwise the overall primary principal.
    pub fn available_principal<'a>(&self, principals: &'a PrincipalSet) -> Option<&'a Principal> {
        principals.available_principal(&self.name)
    }

    // ── Authentication ───────────────────────────────────────────────────────

    /// Look up and verify the record for `token`.
    ///
    /// Consults the authentication cache first and fills it on a miss.
    /// Whether the record came from the cache or the backend, the submitted
    /// credential is always matched against it and the account status is
    /// checked; a cached record is never returned unverified.
    pub fn authenticate(&self, token: &AuthenticationToken) -> RealmResult<Option<AuthenticationRecord>> {
        let Some(lookup) = &self.authentication_lookup else {
            trace!(realm = %self.name, "no authentication lookup configured");
            return Ok(None);
        };

        let record = match self.cached_authentication_record(token)? {
            Some(record) => record,
            None => {
                let Some(record) = lookup.lookup(token)? else {
                    debug!(
                        realm = %self.name,
                        principal = %token.principal(),
                        "no account found for submitted token"
                    );
                    return Ok(None);
                };
                let record = Arc::new(record);
                self.cache_authentication_record(token, &record)?;
                record
            }
        };

        self.assert_credentials_match(token, &record)?;
        self.assert_account_usable(token, &record)?;

        debug!(
            realm = %self.name,
            principals = %record.principals(),
            "authentication succeeded"
        );
        Ok(Some(record.as_ref().clone()))
    }

    fn cached_authentication_record(
        &self,
        token: &AuthenticationToken,
    ) -> RealmResult<Option<Arc<AuthenticationRecord>>> {
        let Some(cache) = self.authentication_cache.cache() else {
            return Ok(None);
        };
        let Some(key) = (self.token_key)(token) else {
            return Ok(None);
        };
        let cached = cache.get(&key)?;
        trace!(
            realm = %self.name,
            cache = %self.authentication_cache.name(),
            key = %key,
            hit = cached.is_some(),
            "authentication cache lookup"
        );
        Ok(cached)
    }

    fn cache_authentication_record(
        &self,
        token: &AuthenticationToken,
        record: &Arc<AuthenticationRecord>,
    ) -> RealmResult<()> {
        let Some(cache) = self.authentication_cache.cache() else {
            return Ok(());
        };
        if let Some(key) = (self.token_key)(token) {
            trace!(realm = %self.name, key = %key, "caching authentication record");
            cache.put(key, Arc::clone(record))?;
        }
        Ok(())
    }

    fn assert_credentials_match(
        &self,
        token: &AuthenticationToken,
        record: &AuthenticationRecord,
    ) -> RealmResult<()> {
        let Some(matcher) = &self.credentials_matcher else {
            return Err(RealmError::ConfigError {
                reason: format!(
                    "realm '{}' has no credentials matcher; credentials cannot be verified",
                    self.name
                ),
            });
        };
        if matcher.matches(token, record) {
            Ok(())
        } else {
            warn!(
                realm = %self.name,
                principal = %token.principal(),
                "submitted credentials did not match"
            );
            Err(RealmError::IncorrectCredentials {
                principal: token.principal().to_string(),
            })
        }
    }

    fn assert_account_usable(&self, token: &AuthenticationToken, record: &AuthenticationRecord) -> RealmResult<()> {
        if record.is_locked() {
            warn!(realm = %self.name, principal = %token.principal(), "account is locked");
            return Err(RealmError::LockedAccount {
                principal: token.principal().to_string(),
            });
        }
        if record.is_credentials_expired_at(Utc::now()) {
            warn!(realm = %self.name, principal = %token.principal(), "credentials have expired");
            return Err(RealmError::ExpiredCredentials {
                principal: token.principal().to_string(),
            });
        }
        Ok(())
    }

    // ── Authorization record ─────────────────────────────────────────────────

    /// Fetch the authorization record for `principals`, through the cache.
    ///
    /// Returns `Ok(None)` for an empty set or when the backend knows nothing
    /// about the subject. A record the backend returns is stored under the
    /// same key so the next call for an equal principal set is served from
    /// the cache.
    pub fn authorization_record(&self, principals: &PrincipalSet) -> RealmResult<Option<Arc<AuthorizationRecord>>> {
        if principals.is_empty() {
            return Ok(None);
        }

        let cache = self.authorization_cache.cache();
        let key = cache.and_then(|_| (self.authorization_key)(principals));

        if let (Some(cache), Some(key)) = (cache, &key) {
            if let Some(record) = cache.get(key)? {
                trace!(
                    realm = %self.name,
                    cache = %self.authorization_cache.name(),
                    principals = %principals,
                    "authorization cache hit"
                );
                return Ok(Some(record));
            }
            trace!(realm = %self.name, principals = %principals, "authorization cache miss");
        }

        let Some(lookup) = &self.authorization_lookup else {
            return Ok(None);
        };
        let Some(record) = lookup.lookup(principals)? else {
            debug!(realm = %self.name, principals = %principals, "no authorization record");
            return Ok(None);
        };
        let record = Arc::new(record);

        if let (Some(cache), Some(key)) = (cache, key) {
            cache.put(key, Arc::clone(&record))?;
        }
        Ok(Some(record))
    }

    /// Remove the cached authorization record for `principals`, if any.
    ///
    /// Call after the backend changes a subject's roles or permissions.
    pub fn clear_cached_authorization_record(&self, principals: &PrincipalSet) -> RealmResult<()> {
        if principals.is_empty() {
            return Ok(());
        }
        if let Some(cache) = self.authorization_cache.cache() {
            if let Some(key) = (self.authorization_key)(principals) {
                trace!(realm = %self.name, key = %key, "clearing cached authorization record");
                cache.remove(&key)?;
            }
        }
        Ok(())
    }

    /// Remove the cached authentication record for `principals`, if any.
    pub fn clear_cached_authentication_record(&self, principals: &PrincipalSet) -> RealmResult<()> {
        if principals.is_empty() {
            return Ok(());
        }
        if let Some(cache) = self.authentication_cache.cache() {
            if let Some(key) = (self.authentication_key)(principals) {
                trace!(realm = %self.name, key = %key, "clearing cached authentication record");
                cache.remove(&key)?;
            }
        }
        Ok(())
    }

    /// Clear both cached records for `principals`.
    pub fn clear_cache(&self, principals: &PrincipalSet) -> RealmResult<()> {
        self.clear_cached_authentication_record(principals)?;
        self.clear_cached_authorization_record(principals)
    }

    /// Logout hook: drop everything cached for the subject.
    pub fn on_logout(&self, principals: &PrincipalSet) -> RealmResult<()> {
        debug!(realm = %self.name, principals = %principals, "clearing caches on logout");
        self.clear_cache(principals)
    }

    // ── Permission derivation ────────────────────────────────────────────────

    /// Every permission `record` grants, duplicates removed.
    pub fn permissions_for(&self, record: &AuthorizationRecord) -> RealmResult<HashSet<SharedPermission>> {
        let mut permissions: HashSet<SharedPermission> = record.object_permissions().clone();

        if !record.string_permissions().is_empty() {
            let resolver = self.require_permission_resolver()?;
            for text in record.string_permissions() {
                permissions.insert(resolver.resolve(text)?);
            }
        }

        if let Some(resolver) = &self.role_permission_resolver {
            for role in record.roles() {
                permissions.extend(resolver.resolve_permissions_in_role(role)?);
            }
        }

        Ok(permissions)
    }

    fn require_permission_resolver(&self) -> RealmResult<&Arc<dyn PermissionResolver>> {
        self.permission_resolver
            .as_ref()
            .ok_or_else(|| RealmError::ConfigError {
                reason: format!(
                    "realm '{}' has no permission resolver; permission strings cannot be resolved",
                    self.name
                ),
            })
    }

    fn resolve_request(&self, request: &PermissionRequest) -> RealmResult<SharedPermission> {
        match request {
            PermissionRequest::Resolved(permission) => Ok(Arc::clone(permission)),
            PermissionRequest::Unresolved(text) => self.require_permission_resolver()?.resolve(text),
        }
    }

    /// The permission set for `principals`, or `None` when there is no record.
    fn granted_permissions(&self, principals: &PrincipalSet) -> RealmResult<Option<HashSet<SharedPermission>>> {
        match self.authorization_record(principals)? {
            Some(record) => self.permissions_for(&record).map(Some),
            None => Ok(None),
        }
    }
}

fn implied_by(granted: &HashSet<SharedPermission>, requested: &dyn Permission) -> bool {
    granted.iter().any(|permission| permission.implies(requested))
}

impl fmt::Debug for StandardRealm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StandardRealm")
            .field("name", &self.name)
            .field("supported_tokens", &self.supported_tokens)
            .field("authentication_cache", &self.authentication_cache.name())
            .field("authorization_cache", &self.authorization_cache.name())
            .finish_non_exhaustive()
    }
}

// ── Trait impls ───────────────────────────────────────────────────────────────

impl Realm for StandardRealm {
    fn name(&self) -> &str {
        StandardRealm::name(self)
    }

    fn supports(&self, token: &AuthenticationToken) -> bool {
        StandardRealm::supports(self, token)
    }

    fn authenticate(&self, token: &AuthenticationToken) -> RealmResult<Option<AuthenticationRecord>> {
        StandardRealm::authenticate(self, token)
    }

    fn on_logout(&self, principals: &PrincipalSet) -> RealmResult<()> {
        StandardRealm::on_logout(self, principals)
    }

    fn as_authorizer(&self) -> Option<&dyn Authorizer> {
        Some(self)
    }
}

/// Each decision fetches the authorization record once and derives the
/// permission set once, however many permissions or roles are asked about.
/// A missing record denies everything.
impl Authorizer for StandardRealm {
    fn is_permitted(&self, principals: &PrincipalSet, permission: &PermissionRequest) -> RealmResult<bool> {
        let requested = self.resolve_request(permission)?;
        Ok(self
            .granted_permissions(principals)?
            .is_some_and(|granted| implied_by(&granted, requested.as_ref())))
    }

    fn is_permitted_each(
        &self,
        principals: &PrincipalSet,
        permissions: &[PermissionRequest],
    ) -> RealmResult<Vec<bool>> {
        let requested = permissions
            .iter()
            .map(|p| self.resolve_request(p))
            .collect::<RealmResult<Vec<_>>>()?;
        let Some(granted) = self.granted_permissions(principals)? else {
            return Ok(vec![false; requested.len()]);
        };
        Ok(requested
            .iter()
            .map(|p| implied_by(&granted, p.as_ref()))
            .collect())
    }

    fn is_permitted_all(
        &self,
        principals: &PrincipalSet,
        permissions: &[PermissionRequest],
    ) -> RealmResult<bool> {
        let Some(granted) = self.granted_permissions(principals)? else {
            return Ok(false);
        };
        for permission in permissions {
            let requested = self.resolve_request(permission)?;
            if !implied_by(&granted, requested.as_ref()) {
                trace!(realm = %self.name, permission = %permission, "permission denied, stopping");
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn check_permissions(
        &self,
        principals: &PrincipalSet,
        permissions: &[PermissionRequest],
    ) -> RealmResult<()> {
        if permissions.is_empty() {
            return Ok(());
        }
        let granted = self.granted_permissions(principals)?.unwrap_or_default();
        for permission in permissions {
            let requested = self.resolve_request(permission)?;
            if !implied_by(&granted, requested.as_ref()) {
                return Err(permission_denied(principals, permission));
            }
        }
        Ok(())
    }

    fn has_role(&self, principals: &PrincipalSet, role: &str) -> RealmResult<bool> {
        Ok(self
            .authorization_record(principals)?
            .is_some_and(|record| record.has_role(role)))
    }

    fn has_roles(&self, principals: &PrincipalSet, roles: &[&str]) -> RealmResult<Vec<bool>> {
        let record = self.authorization_record(principals)?;
        Ok(roles
            .iter()
            .map(|role| record.as_ref().is_some_and(|r| r.has_role(role)))
            .collect())
    }

    fn has_all_roles(&self, principals: &PrincipalSet, roles: &[&str]) -> RealmResult<bool> {
        Ok(self
            .authorization_record(principals)?
            .is_some_and(|record| roles.iter().all(|role| record.has_role(role))))
    }

    fn check_roles(&self, principals: &PrincipalSet, roles: &[&str]) -> RealmResult<()> {
        if roles.is_empty() {
            return Ok(());
        }
        let record = self.authorization_record(principals)?;
        for role in roles {
            if !record.as_ref().is_some_and(|r| r.has_role(role)) {
                return Err(role_denied(principals, role));
            }
        }
        Ok(())
    }
}

// ── Builder ───────────────────────────────────────────────────────────────────

/// Configures a [`StandardRealm`]. `build()` validates eagerly.
pub struct StandardRealmBuilder {
    name: String,
    supported_tokens: Vec<TokenKind>,
    authentication_lookup: Option<Arc<dyn AuthenticationLookup>>,
    authorization_lookup: Option<Arc<dyn AuthorizationLookup>>,
    credentials_matcher: Option<Arc<dyn CredentialsMatcher>>,
    permission_resolver: Option<Arc<dyn PermissionResolver>>,
    role_permission_resolver: Option<Arc<dyn RolePermissionResolver>>,
    cache_manager: Option<Arc<dyn RealmCacheManager>>,
    authentication_caching: bool,
    authentication_cache: Option<Arc<AuthenticationCache>>,
    authentication_cache_name: Option<String>,
    authorization_caching: bool,
    authorization_cache: Option<Arc<AuthorizationCache>>,
    authorization_cache_name: Option<String>,
    token_key: Option<TokenKeyResolver>,
    authentication_key: Option<PrincipalsKeyResolver>,
    authorization_key: Option<PrincipalsKeyResolver>,
}

impl StandardRealmBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            supported_tokens: vec![TokenKind::UsernamePassword],
            authentication_lookup: None,
            authorization_lookup: None,
            credentials_matcher: None,
            permission_resolver: None,
            role_permission_resolver: None,
            cache_manager: None,
            authentication_caching: false,
            authentication_cache: None,
            authentication_cache_name: None,
            authorization_caching: true,
            authorization_cache: None,
            authorization_cache_name: None,
            token_key: None,
            authentication_key: None,
            authorization_key: None,
        }
    }

    /// Replace the accepted token shapes (default: username/password only).
    pub fn supported_tokens(mut self, kinds: impl IntoIterator<Item = TokenKind>) -> Self {
        self.supported_tokens = kinds.into_iter().collect();
        self
    }

    pub fn authentication_lookup(mut self, lookup: impl AuthenticationLookup + 'static) -> Self {
        self.authentication_lookup = Some(Arc::new(lookup));
        self
    }

    pub fn authorization_lookup(mut self, lookup: impl AuthorizationLookup + 'static) -> Self {
        self.authorization_lookup = Some(Arc::new(lookup));
        self
    }

    pub fn credentials_matcher(mut self, matcher: Arc<dyn CredentialsMatcher>) -> Self {
        self.credentials_matcher = Some(matcher);
        self
    }

    pub fn permission_resolver(mut self, resolver: Arc<dyn PermissionResolver>) -> Self {
        self.permission_resolver = Some(resolver);
        self
    }

    pub fn role_permission_resolver(mut self, resolver: Arc<dyn RolePermissionResolver>) -> Self {
        self.role_permission_resolver = Some(resolver);
        self
    }

    /// The manager asked for any cache not configured explicitly.
    pub fn cache_manager(mut self, manager: Arc<dyn RealmCacheManager>) -> Self {
        self.cache_manager = Some(manager);
        self
    }

    /// Turn authentication caching on or off (default: off).
    pub fn authentication_caching(mut self, enabled: bool) -> Self {
        self.authentication_caching = enabled;
        self
    }

    /// Use this cache for authentication records. Enables authentication caching.
    pub fn authentication_cache(mut self, cache: Arc<AuthenticationCache>) -> Self {
        self.authentication_cache = Some(cache);
        self.authentication_caching = true;
        self
    }

    pub fn authentication_cache_name(mut self, name: impl Into<String>) -> Self {
        self.authentication_cache_name = Some(name.into());
        self
    }

    /// Turn authorization caching on or off (default: on).
    pub fn authorization_caching(mut self, enabled: bool) -> Self {
        self.authorization_caching = enabled;
        self
    }

    /// Use this cache for authorization records. Enables authorization caching.
    pub fn authorization_cache(mut self, cache: Arc<AuthorizationCache>) -> Self {
        self.authorization_cache = Some(cache);
        self.authorization_caching = true;
        self
    }

    pub fn authorization_cache_name(mut self, name: impl Into<String>) -> Self {
        self.authorization_cache_name = Some(name.into());
        self
    }

    /// Key authentication records by something other than the token's principal.
    ///
    /// Pair with [`authentication_logout_key`](Self::authentication_logout_key)
    /// so logout clears the same entry.
    pub fn authentication_cache_key(
        mut self,
        resolver: impl Fn(&AuthenticationToken) -> Option<CacheKey> + Send + Sync + 'static,
    ) -> Self {
        self.token_key = Some(Arc::new(resolver));
        self
    }

    /// The key cleared from the authentication cache for a principal set.
    pub fn authentication_logout_key(
        mut self,
        resolver: impl Fn(&PrincipalSet) -> Option<CacheKey> + Send + Sync + 'static,
    ) -> Self {
        self.authentication_key = Some(Arc::new(resolver));
        self
    }

    /// Key authorization records by something other than the whole principal set.
    pub fn authorization_cache_key(
        mut self,
        resolver: impl Fn(&PrincipalSet) -> Option<CacheKey> + Send + Sync + 'static,
    ) -> Self {
        self.authorization_key = Some(Arc::new(resolver));
        self
    }

    /// Validate the configuration and produce the realm.
    ///
    /// # Errors
    ///
    /// `RealmError::ConfigError` if the name is blank or an authentication
    /// lookup is configured without a credentials matcher.
    pub fn build(self) -> RealmResult<StandardRealm> {
        if self.name.trim().is_empty() {
            return Err(RealmError::ConfigError {
                reason: "realm name must not be empty".to_string(),
            });
        }
        if self.authentication_lookup.is_some() && self.credentials_matcher.is_none() {
            return Err(RealmError::ConfigError {
                reason: format!(
                    "realm '{}' authenticates accounts but has no credentials matcher",
                    self.name
                ),
            });
        }

        let name = self.name;
        let authentication_cache = CacheSlot::new(
            self.authentication_cache_name
                .unwrap_or_else(|| format!("{}{}", name, AUTHENTICATION_CACHE_SUFFIX)),
            self.authentication_caching,
            self.authentication_cache,
            self.cache_manager.clone(),
        );
        let authorization_cache = CacheSlot::new(
            self.authorization_cache_name
                .unwrap_or_else(|| format!("{}{}", name, AUTHORIZATION_CACHE_SUFFIX)),
            self.authorization_caching,
            self.authorization_cache,
            self.cache_manager,
        );

        let token_key = self
            .token_key
            .unwrap_or_else(|| Arc::new(|token: &AuthenticationToken| Some(CacheKey::Principal(token.principal()))));
        let authentication_key = self.authentication_key.unwrap_or_else(|| {
            let realm = name.clone();
            Arc::new(move |principals: &PrincipalSet| {
                principals
                    .available_principal(&realm)
                    .cloned()
                    .map(CacheKey::Principal)
            })
        });
        let authorization_key = self
            .authorization_key
            .unwrap_or_else(|| Arc::new(|principals: &PrincipalSet| Some(CacheKey::Principals(principals.clone()))));

        debug!(
            realm = %name,
            authentication_cache = %authentication_cache.name(),
            authorization_cache = %authorization_cache.name(),
            "realm configured"
        );

        Ok(StandardRealm {
            name,
            supported_tokens: self.supported_tokens,
            authentication_lookup: self.authentication_lookup,
            authorization_lookup: self.authorization_lookup,
            credentials_matcher: self.credentials_matcher,
            permission_resolver: self.permission_resolver,
            role_permission_resolver: self.role_permission_resolver,
            authentication_cache,
            authorization_cache,
            token_key,
            authentication_key,
            authorization_key,
        })
    }
}
