//! `InMemoryRealm`: accounts and roles held in process memory.
//!
//! Two maps, each behind its own read/write lock: username principal →
//! `Account` and role name → `Role`. Authentication and authorization lookups take the
//! read side; `add_*`/`remove_*` take the write side. Locking is per map,
//! not per entry, which suits the small account sets this realm is for
//! (tests, demos, bootstrap administrators) and nothing larger.
//!
//! Role permissions are looked up on every decision rather than copied into
//! the cached authorization record, so `add_role` takes effect immediately.

use std::{collections::HashMap, fmt, ops::Deref, sync::Arc};

use parking_lot::RwLock;
use tracing::{debug, info};

use castellan_contracts::{
    account::{Account, Role},
    error::{RealmError, RealmResult},
    permission::SharedPermission,
    principal::{Principal, PrincipalKind, PrincipalSet},
    record::{AuthenticationRecord, AuthorizationRecord},
    token::{AuthenticationToken, TokenKind},
};
use castellan_core::{
    realm::StandardRealm,
    traits::{
        Authorizer, CacheKey, CredentialsMatcher, PermissionResolver, Realm, RealmCacheManager,
        RolePermissionResolver,
    },
};
use castellan_credential::SimpleCredentialsMatcher;
use castellan_permission::WildcardPermissionResolver;

// ── AccountBook ───────────────────────────────────────────────────────────────

#[derive(Default)]
struct AccountBook {
    accounts: RwLock<HashMap<Principal, Account>>,
    roles: RwLock<HashMap<String, Role>>,
}

impl AccountBook {
    fn authentication_record(&self, token: &AuthenticationToken) -> Option<AuthenticationRecord> {
        let AuthenticationToken::UsernamePassword(token) = token else {
            return None;
        };
        self.accounts
            .read()
            .get(&Principal::username(token.username()))
            .map(Account::authentication_record)
    }

    fn authorization_record(&self, principals: &PrincipalSet, realm: &str) -> Option<AuthorizationRecord> {
        let username = account_key(principals, realm)?;
        self.accounts
            .read()
            .get(username)
            .map(|account| account.authorization_record().clone())
    }
}

impl RolePermissionResolver for AccountBook {
    fn resolve_permissions_in_role(&self, role: &str) -> RealmResult<Vec<SharedPermission>> {
        Ok(self
            .roles
            .read()
            .get(role)
            .map(|role| role.permissions().iter().cloned().collect())
            .unwrap_or_default())
    }
}

/// The username principal an account is filed under: the first one this
/// realm contributed, else the first anywhere in the set.
fn account_key<'a>(principals: &'a PrincipalSet, realm: &str) -> Option<&'a Principal> {
    principals
        .from_realm(realm)
        .iter()
        .find(|p| p.kind() == PrincipalKind::Username)
        .or_else(|| principals.one_of_kind(PrincipalKind::Username))
}

fn username_of(account: &Account, realm: &str) -> RealmResult<Principal> {
    account_key(account.principals(), realm)
        .cloned()
        .ok_or_else(|| RealmError::ConfigError {
            reason: format!(
                "in-memory accounts are keyed by username, but account [{}] has no username principal",
                account.principals()
            ),
        })
}

// ── InMemoryRealm ─────────────────────────────────────────────────────────────

/// A realm over in-memory account and role maps.
///
/// Dereferences to the underlying [`StandardRealm`] for cache maintenance
/// and the decision surface.
pub struct InMemoryRealm {
    realm: StandardRealm,
    book: Arc<AccountBook>,
}

impl InMemoryRealm {
    pub fn builder(name: impl Into<String>) -> InMemoryRealmBuilder {
        InMemoryRealmBuilder::new(name)
    }

    /// Add or replace an account, keyed by its username principal.
    ///
    /// Anything cached for the account's principals (and for those of the
    /// account it replaces) is cleared.
    ///
    /// # Errors
    ///
    /// `RealmError::ConfigError` if the account has no username principal.
    pub fn add_account(&self, account: Account) -> RealmResult<()> {
        let username = username_of(&account, self.realm.name())?;
        let principals = account.principals().clone();
        let replaced = self.book.accounts.write().insert(username.clone(), account);

        if let Some(old) = replaced {
            self.realm.clear_cache(old.principals())?;
        }
        self.realm.clear_cache(&principals)?;
        debug!(realm = %self.realm.name(), username = %username, "account added");
        Ok(())
    }

    /// Remove the account for `username`, returning it if present.
    pub fn remove_account(&self, username: &str) -> RealmResult<Option<Account>> {
        let removed = self.book.accounts.write().remove(&Principal::username(username));
        if let Some(account) = &removed {
            self.realm.clear_cache(account.principals())?;
            debug!(realm = %self.realm.name(), username = %username, "account removed");
        }
        Ok(removed)
    }

    /// Add or replace a role. Takes effect on the next decision.
    pub fn add_role(&self, role: Role) {
        debug!(realm = %self.realm.name(), role = %role.name(), "role added");
        self.book.roles.write().insert(role.name().to_string(), role);
    }

    pub fn account_exists(&self, username: &str) -> bool {
        self.book.accounts.read().contains_key(&Principal::username(username))
    }

    pub fn role_exists(&self, name: &str) -> bool {
        self.book.roles.read().contains_key(name)
    }

    pub fn account_count(&self) -> usize {
        self.book.accounts.read().len()
    }
}

impl Deref for InMemoryRealm {
    type Target = StandardRealm;

    fn deref(&self) -> &StandardRealm {
        &self.realm
    }
}

impl fmt::Debug for InMemoryRealm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryRealm")
            .field("realm", &self.realm)
            .field("accounts", &self.account_count())
            .field("roles", &self.book.roles.read().len())
            .finish()
    }
}

impl Realm for InMemoryRealm {
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

/// Configures an [`InMemoryRealm`].
///
/// Defaults: username/password tokens, the simple credentials matcher, the
/// wildcard permission resolver, authentication caching off and
/// authorization caching on.
pub struct InMemoryRealmBuilder {
    name: String,
    accounts: Vec<Account>,
    roles: Vec<Role>,
    credentials_matcher: Arc<dyn CredentialsMatcher>,
    permission_resolver: Arc<dyn PermissionResolver>,
    cache_manager: Option<Arc<dyn RealmCacheManager>>,
    authentication_caching: bool,
    authorization_caching: bool,
}

impl InMemoryRealmBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            accounts: Vec::new(),
            roles: Vec::new(),
            credentials_matcher: Arc::new(SimpleCredentialsMatcher::new()),
            permission_resolver: Arc::new(WildcardPermissionResolver::new()),
            cache_manager: None,
            authentication_caching: false,
            authorization_caching: true,
        }
    }

    pub fn account(mut self, account: Account) -> Self {
        self.accounts.push(account);
        self
    }

    pub fn role(mut self, role: Role) -> Self {
        self.roles.push(role);
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

    pub fn cache_manager(mut self, manager: Arc<dyn RealmCacheManager>) -> Self {
        self.cache_manager = Some(manager);
        self
    }

    pub fn authentication_caching(mut self, enabled: bool) -> Self {
        self.authentication_caching = enabled;
        self
    }

    pub fn authorization_caching(mut self, enabled: bool) -> Self {
        self.authorization_caching = enabled;
        self
    }

    /// Validate and produce the realm, loading the configured accounts and roles.
    ///
    /// # Errors
    ///
    /// `RealmError::ConfigError` if the name is blank or an account has no
    /// username principal.
    pub fn build(self) -> RealmResult<InMemoryRealm> {
        let book = Arc::new(AccountBook::default());
        let authn_book = Arc::clone(&book);
        let authz_book = Arc::clone(&book);
        let realm_name = self.name.clone();
        let logout_realm = self.name.clone();

        let mut builder = StandardRealm::builder(self.name)
            .supported_tokens([TokenKind::UsernamePassword])
            .authentication_lookup(
                move |token: &AuthenticationToken| -> RealmResult<Option<AuthenticationRecord>> {
                    Ok(authn_book.authentication_record(token))
                },
            )
            .authorization_lookup(
                move |principals: &PrincipalSet| -> RealmResult<Option<AuthorizationRecord>> {
                    Ok(authz_book.authorization_record(principals, &realm_name))
                },
            )
            .authentication_logout_key(move |principals: &PrincipalSet| {
                account_key(principals, &logout_realm).cloned().map(CacheKey::Principal)
            })
            .credentials_matcher(self.credentials_matcher)
            .permission_resolver(self.permission_resolver)
            .role_permission_resolver(Arc::clone(&book) as Arc<dyn RolePermissionResolver>)
            .authentication_caching(self.authentication_caching)
            .authorization_caching(self.authorization_caching);
        if let Some(manager) = self.cache_manager {
            builder = builder.cache_manager(manager);
        }

        let realm = InMemoryRealm {
            realm: builder.build()?,
            book,
        };
        for role in self.roles {
            realm.add_role(role);
        }
        for account in self.accounts {
            realm.add_account(account)?;
        }
        info!(
            realm = %realm.name(),
            accounts = realm.account_count(),
            "in-memory realm loaded"
        );
        Ok(realm)
    }
}
