//! # castellan-realm
//!
//! Concrete realms built on the `StandardRealm` engine.
//!
//! ## Overview
//!
//! - [`AccountStoreRealm`]: wraps one external [`AccountStore`] with an
//!   account cache; every authentication re-verifies the submitted
//!   credential, even against a cached record
//! - [`InMemoryRealm`]: accounts and roles held in two lock-guarded maps
//! - [`RealmsConfig`] / [`RealmDefinition`]: TOML declarations that build
//!   in-memory realms
//!
//! [`AccountStore`]: castellan_core::traits::AccountStore
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::path::Path;
//! use castellan_realm::RealmsConfig;
//!
//! let realms = RealmsConfig::from_file(Path::new("config/realms.toml"))?
//!     .into_realms(Some(caches.clone()))?;
//! ```

pub mod account_store;
pub mod config;
pub mod memory;

pub use account_store::{AccountStoreRealm, AccountStoreRealmBuilder, ACCOUNT_CACHE_SUFFIX};
pub use config::{RealmDefinition, RealmsConfig, UserDefinition};
pub use memory::{InMemoryRealm, InMemoryRealmBuilder};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        path::Path,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
    };

    use chrono::{Duration, Utc};

    use castellan_cache::MemoryCacheManager;
    use castellan_contracts::{
        account::{Account, Role},
        error::{RealmError, RealmResult},
        permission::PermissionRequest,
        principal::{Principal, PrincipalSet},
        record::AuthorizationRecord,
        token::AuthenticationToken,
    };
    use castellan_core::traits::{
        AccountStore, Authorizer, CacheKey, PermissionResolver, Realm, RealmCacheManager,
    };
    use castellan_credential::sha256_hex;
    use castellan_permission::WildcardPermissionResolver;

    use super::*;

    // ── Helpers ───────────────────────────────────────────────────────────────

    /// An account store that counts lookups.
    #[derive(Default)]
    struct CountingStore {
        accounts: HashMap<String, Account>,
        grants: HashMap<String, AuthorizationRecord>,
        lookups: AtomicUsize,
        authorizations: AtomicUsize,
    }

    impl CountingStore {
        fn with_account(mut self, account: Account) -> Self {
            let username = account.principals().primary_principal().map(ToString::to_string).unwrap_or_default();
            self.accounts.insert(username, account);
            self
        }

        fn with_grant(mut self, username: &str, record: AuthorizationRecord) -> Self {
            self.grants.insert(username.to_string(), record);
            self
        }
    }

    impl AccountStore for CountingStore {
        fn lookup(&self, token: &AuthenticationToken) -> RealmResult<Option<Account>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.accounts.get(&token.principal().to_string()).cloned())
        }

        fn authorization(&self, principals: &PrincipalSet) -> RealmResult<Option<AuthorizationRecord>> {
            self.authorizations.fetch_add(1, Ordering::SeqCst);
            let Some(principal) = principals.primary_principal() else {
                return Ok(None);
            };
            Ok(self.grants.get(&principal.to_string()).cloned())
        }
    }

    /// A store whose backend is down.
    struct FailingStore;

    impl AccountStore for FailingStore {
        fn lookup(&self, _token: &AuthenticationToken) -> RealmResult<Option<Account>> {
            Err(RealmError::Backend {
                realm: "ldap".to_string(),
                reason: "connection refused".to_string(),
            })
        }
    }

    fn token(username: &str, password: &str) -> AuthenticationToken {
        AuthenticationToken::username_password(username, password)
    }

    fn manager() -> Arc<MemoryCacheManager> {
        Arc::new(MemoryCacheManager::new())
    }

    fn as_realm_manager(manager: &Arc<MemoryCacheManager>) -> Arc<dyn RealmCacheManager> {
        manager.clone()
    }

    fn perm(text: &str) -> PermissionRequest {
        PermissionRequest::from(text)
    }

    fn wonderland() -> InMemoryRealm {
        let resolver = WildcardPermissionResolver::new();
        InMemoryRealm::builder("wonderland")
            .role(
                Role::new("admin")
                    .with_permission(resolver.resolve("user:*").unwrap())
                    .with_permission(resolver.resolve("printer:print").unwrap()),
            )
            .account(
                Account::new("alice", "rabbit", "wonderland")
                    .with_role("admin")
                    .with_string_permission("report:read"),
            )
            .account(Account::new("bob", "builder", "wonderland"))
            .build()
            .unwrap()
    }

    // ── 1. Account-store realm ───────────────────────────────────────────────

    /// A cached record never authenticates a wrong credential.
    #[test]
    fn test_cached_record_is_reverified() {
        let store = Arc::new(CountingStore::default().with_account(Account::new("alice", "secret", "ldap")));
        let caches = manager();
        let realm = AccountStoreRealm::builder("ldap", store.clone())
            .cache_manager(as_realm_manager(&caches))
            .build()
            .unwrap();

        let record = realm.authenticate(&token("alice", "secret")).unwrap().unwrap();
        assert_eq!(record.principals().primary_principal().unwrap().to_string(), "alice");
        assert_eq!(store.lookups.load(Ordering::SeqCst), 1);

        match realm.authenticate(&token("alice", "guess")) {
            Err(RealmError::IncorrectCredentials { principal }) => assert_eq!(principal, "alice"),
            other => panic!("expected IncorrectCredentials, got {:?}", other),
        }
        assert_eq!(store.lookups.load(Ordering::SeqCst), 1, "second attempt must be served from the cache");

        assert!(realm.authenticate(&token("alice", "secret")).unwrap().is_some());
        assert_eq!(store.lookups.load(Ordering::SeqCst), 1);
    }

    /// The account cache defaults to `<name>.accountCache`.
    #[test]
    fn test_account_cache_name() {
        let store = Arc::new(CountingStore::default().with_account(Account::new("alice", "secret", "ldap")));
        let caches = manager();
        let realm = AccountStoreRealm::builder("ldap", store)
            .cache_manager(as_realm_manager(&caches))
            .build()
            .unwrap();

        assert_eq!(realm.account_cache_name(), "ldap.accountCache");
        realm.authenticate(&token("alice", "secret")).unwrap();
        assert!(caches.cache_names().contains(&"ldap.accountCache".to_string()));
    }

    /// Unknown accounts are a normal `None`, and are not cached.
    #[test]
    fn test_unknown_account_is_none() {
        let store = Arc::new(CountingStore::default());
        let realm = AccountStoreRealm::builder("ldap", store.clone())
            .cache_manager(as_realm_manager(&manager()))
            .build()
            .unwrap();

        assert!(realm.authenticate(&token("nobody", "x")).unwrap().is_none());
        assert!(realm.authenticate(&token("nobody", "x")).unwrap().is_none());
        assert_eq!(store.lookups.load(Ordering::SeqCst), 2);
    }

    /// Locked and expired accounts fail after their credentials match.
    #[test]
    fn test_account_status_is_enforced() {
        let store = Arc::new(
            CountingStore::default()
                .with_account(Account::new("mallory", "pw", "ldap").with_locked(true))
                .with_account(
                    Account::new("oscar", "pw", "ldap").with_credentials_expire_at(Utc::now() - Duration::hours(1)),
                ),
        );
        let realm = AccountStoreRealm::builder("ldap", store).build().unwrap();

        match realm.authenticate(&token("mallory", "pw")) {
            Err(RealmError::LockedAccount { principal }) => assert_eq!(principal, "mallory"),
            other => panic!("expected LockedAccount, got {:?}", other),
        }
        match realm.authenticate(&token("oscar", "pw")) {
            Err(RealmError::ExpiredCredentials { principal }) => assert_eq!(principal, "oscar"),
            other => panic!("expected ExpiredCredentials, got {:?}", other),
        }
        // A wrong password is reported as such, not as a status problem.
        assert!(matches!(
            realm.authenticate(&token("mallory", "nope")),
            Err(RealmError::IncorrectCredentials { .. })
        ));
    }

    /// Backend failures surface unchanged.
    #[test]
    fn test_store_failure_propagates() {
        let realm = AccountStoreRealm::builder("ldap", Arc::new(FailingStore)).build().unwrap();
        match realm.authenticate(&token("alice", "secret")) {
            Err(RealmError::Backend { reason, .. }) => assert_eq!(reason, "connection refused"),
            other => panic!("expected Backend, got {:?}", other),
        }
    }

    /// Authorization data comes from the store and is cached.
    #[test]
    fn test_store_authorization() {
        let store = Arc::new(
            CountingStore::default()
                .with_account(Account::new("alice", "secret", "ldap"))
                .with_grant("alice", AuthorizationRecord::new().with_role("ops").with_string_permission("host:*")),
        );
        let realm = AccountStoreRealm::builder("ldap", store.clone())
            .cache_manager(as_realm_manager(&manager()))
            .build()
            .unwrap();
        let alice = PrincipalSet::of_principal("alice", "ldap");

        assert!(realm.has_role(&alice, "ops").unwrap());
        assert!(realm.is_permitted(&alice, &perm("host:restart")).unwrap());
        assert!(!realm.is_permitted(&alice, &perm("db:drop")).unwrap());
        assert_eq!(store.authorizations.load(Ordering::SeqCst), 1);

        realm.on_logout(&alice).unwrap();
        assert!(realm.has_role(&alice, "ops").unwrap());
        assert_eq!(store.authorizations.load(Ordering::SeqCst), 2);
    }

    /// A custom account cache key is cleared on logout through its paired logout key.
    #[test]
    fn test_custom_account_cache_key_cleared_on_logout() {
        let store = Arc::new(CountingStore::default().with_account(Account::new("alice", "secret", "ldap")));
        let caches = manager();
        let realm = AccountStoreRealm::builder("ldap", store.clone())
            .cache_manager(as_realm_manager(&caches))
            .account_cache_key(|token| Some(CacheKey::Text(format!("user:{}", token.principal()))))
            .account_logout_key(|principals| {
                principals
                    .primary_principal()
                    .map(|principal| CacheKey::Text(format!("user:{}", principal)))
            })
            .build()
            .unwrap();

        let record = realm.authenticate(&token("alice", "secret")).unwrap().unwrap();
        realm.authenticate(&token("alice", "secret")).unwrap();
        assert_eq!(store.lookups.load(Ordering::SeqCst), 1);

        realm.on_logout(record.principals()).unwrap();
        assert!(realm.authenticate(&token("alice", "secret")).unwrap().is_some());
        assert_eq!(store.lookups.load(Ordering::SeqCst), 2, "logout must evict the custom-keyed record");
    }

    /// Bearer tokens are not supported by default.
    #[test]
    fn test_account_store_supports_passwords_only() {
        let realm = AccountStoreRealm::builder("ldap", Arc::new(CountingStore::default()))
            .build()
            .unwrap();
        assert!(realm.supports(&token("alice", "x")));
        assert!(!realm.supports(&AuthenticationToken::bearer("abc")));
    }

    // ── 2. In-memory realm ────────────────────────────────────────────────────

    /// Passwords are checked against the stored account.
    #[test]
    fn test_in_memory_authentication() {
        let realm = wonderland();

        let record = realm.authenticate(&token("alice", "rabbit")).unwrap().unwrap();
        assert_eq!(record.principals().from_realm("wonderland").len(), 1);
        assert!(matches!(
            realm.authenticate(&token("alice", "hatter")),
            Err(RealmError::IncorrectCredentials { .. })
        ));
        assert!(realm.authenticate(&token("carol", "x")).unwrap().is_none());
    }

    /// Role permissions, direct permissions and roles all feed decisions.
    #[test]
    fn test_in_memory_decisions() {
        let realm = wonderland();
        let alice = PrincipalSet::of_principal("alice", "wonderland");
        let bob = PrincipalSet::of_principal("bob", "wonderland");

        assert!(realm.is_permitted(&alice, &perm("user:delete")).unwrap());
        assert!(realm.is_permitted(&alice, &perm("report:read")).unwrap());
        assert!(!realm.is_permitted(&alice, &perm("network:ping")).unwrap());
        assert!(realm.has_role(&alice, "admin").unwrap());

        assert!(!realm.is_permitted(&bob, &perm("user:delete")).unwrap());
        assert!(!realm.has_role(&bob, "admin").unwrap());
        match realm.check_role(&bob, "admin") {
            Err(RealmError::Unauthorized { reason }) => assert!(reason.contains("admin")),
            other => panic!("expected Unauthorized, got {:?}", other),
        }
    }

    /// A role added later applies to the next decision without cache clearing.
    #[test]
    fn test_add_role_takes_effect_immediately() {
        let realm = wonderland();
        let bob = PrincipalSet::of_principal("bob", "wonderland");
        realm
            .add_account(Account::new("bob", "builder", "wonderland").with_role("builder"))
            .unwrap();

        assert!(!realm.is_permitted(&bob, &perm("site:build")).unwrap());
        assert!(!realm.role_exists("builder"));

        realm.add_role(Role::new("builder").with_permission(WildcardPermissionResolver::new().resolve("site:*").unwrap()));

        assert!(realm.role_exists("builder"));
        assert!(realm.is_permitted(&bob, &perm("site:build")).unwrap());
    }

    /// Replacing an account clears its cached authorization record.
    #[test]
    fn test_add_account_clears_cached_record() {
        let realm = InMemoryRealm::builder("wonderland")
            .cache_manager(as_realm_manager(&manager()))
            .account(Account::new("bob", "builder", "wonderland"))
            .build()
            .unwrap();
        let bob = PrincipalSet::of_principal("bob", "wonderland");

        assert!(!realm.has_role(&bob, "foreman").unwrap());
        realm
            .add_account(Account::new("bob", "builder", "wonderland").with_role("foreman"))
            .unwrap();
        assert!(realm.has_role(&bob, "foreman").unwrap());
    }

    /// Replacing an account drops its cached authentication record.
    #[test]
    fn test_add_account_invalidates_cached_password() {
        let realm = InMemoryRealm::builder("wonderland")
            .cache_manager(as_realm_manager(&manager()))
            .authentication_caching(true)
            .account(Account::new("bob", "builder", "wonderland"))
            .build()
            .unwrap();

        assert!(realm.authenticate(&token("bob", "builder")).unwrap().is_some());
        realm.add_account(Account::new("bob", "hammer", "wonderland")).unwrap();

        match realm.authenticate(&token("bob", "builder")) {
            Err(RealmError::IncorrectCredentials { principal }) => assert_eq!(principal, "bob"),
            other => panic!("expected IncorrectCredentials, got {:?}", other),
        }
        assert!(realm.authenticate(&token("bob", "hammer")).unwrap().is_some());
    }

    /// An account whose first principal is not its username keeps its roles,
    /// and logout clears both of its cached records.
    #[test]
    fn test_account_keyed_by_username_not_first_principal() {
        let caches = manager();
        let principals = PrincipalSet::builder()
            .add_principal("wonderland", Principal::Id(42))
            .add_principal("wonderland", "alice")
            .build();
        let realm = InMemoryRealm::builder("wonderland")
            .cache_manager(as_realm_manager(&caches))
            .authentication_caching(true)
            .role(Role::new("admin").with_permission(WildcardPermissionResolver::new().resolve("user:*").unwrap()))
            .account(Account::with_principals(principals, "pw").with_role("admin"))
            .build()
            .unwrap();

        let record = realm.authenticate(&token("alice", "pw")).unwrap().unwrap();
        assert_eq!(record.principals().primary_principal(), Some(&Principal::Id(42)));
        assert!(realm.has_role(record.principals(), "admin").unwrap());
        assert!(realm.is_permitted(record.principals(), &perm("user:delete")).unwrap());
        assert_eq!(caches.total_entries(), 2);

        realm.on_logout(record.principals()).unwrap();
        assert_eq!(caches.total_entries(), 0);

        assert!(realm.account_exists("alice"));
        assert!(realm.remove_account("alice").unwrap().is_some());
        assert!(!realm.has_role(record.principals(), "admin").unwrap());
    }

    /// Removing an account revokes authentication and authorization.
    #[test]
    fn test_remove_account() {
        let realm = wonderland();
        let alice = PrincipalSet::of_principal("alice", "wonderland");
        assert!(realm.has_role(&alice, "admin").unwrap());

        let removed = realm.remove_account("alice").unwrap();
        assert!(removed.is_some());
        assert!(!realm.account_exists("alice"));
        assert!(realm.authenticate(&token("alice", "rabbit")).unwrap().is_none());
        assert!(!realm.has_role(&alice, "admin").unwrap());
        assert!(realm.remove_account("alice").unwrap().is_none());
    }

    /// Accounts must carry a username principal.
    #[test]
    fn test_account_without_username_is_rejected() {
        let realm = wonderland();
        let numeric = Account::with_principals(PrincipalSet::of_principal(42i64, "wonderland"), "pw");
        match realm.add_account(numeric) {
            Err(RealmError::ConfigError { reason }) => assert!(reason.contains("username")),
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }

    /// Concurrent readers and a writer share the realm safely.
    #[test]
    fn test_concurrent_access() {
        let realm = Arc::new(wonderland());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let realm = realm.clone();
                std::thread::spawn(move || {
                    if i == 0 {
                        realm.add_account(Account::new("dave", "pw", "wonderland")).unwrap();
                    }
                    assert!(realm.authenticate(&token("alice", "rabbit")).unwrap().is_some());
                    let alice = PrincipalSet::of_principal("alice", "wonderland");
                    assert!(realm.is_permitted(&alice, &perm("printer:print")).unwrap());
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(realm.account_exists("dave"));
    }

    // ── 3. TOML definitions ──────────────────────────────────────────────────

    const REALMS: &str = r#"
        [[realms]]
        name = "corporate"

        [realms.roles]
        admin = ["user:*", "printer:print"]

        [[realms.users]]
        username = "alice"
        password = "wonderland"
        roles = ["admin"]
        permissions = ["report:read"]

        [[realms.users]]
        username = "eve"
        password = "pw"
        locked = true

        [[realms]]
        name = "partners"
        cache_authorization = false
        cache_authentication = true

        [[realms.users]]
        username = "bob"
        password = "builder"
        credentials_expire_at = "2001-01-01T00:00:00Z"
    "#;

    /// Definitions parse with their defaults applied.
    #[test]
    fn test_parse_realms() {
        let config = RealmsConfig::from_toml_str(REALMS).unwrap();
        assert_eq!(config.realms.len(), 2);

        let corporate = &config.realms[0];
        assert!(corporate.cache_authorization);
        assert!(!corporate.cache_authentication);
        assert_eq!(corporate.roles["admin"], vec!["user:*", "printer:print"]);
        assert!(corporate.users[1].locked);

        let partners = &config.realms[1];
        assert!(!partners.cache_authorization);
        assert!(partners.cache_authentication);
        assert!(partners.users[0].credentials_expire_at.is_some());
    }

    /// Built realms authenticate and decide as declared.
    #[test]
    fn test_build_realms_from_toml() {
        let caches = manager();
        let realms = RealmsConfig::from_toml_str(REALMS)
            .unwrap()
            .into_realms(Some(as_realm_manager(&caches)))
            .unwrap();
        let corporate = &realms[0];
        let partners = &realms[1];

        let record = corporate.authenticate(&token("alice", "wonderland")).unwrap().unwrap();
        let alice = record.principals();
        assert!(corporate.is_permitted(alice, &perm("user:create")).unwrap());
        assert!(corporate.is_permitted(alice, &perm("report:read")).unwrap());
        assert!(!corporate.is_permitted(alice, &perm("report:write")).unwrap());

        assert!(matches!(
            corporate.authenticate(&token("eve", "pw")),
            Err(RealmError::LockedAccount { .. })
        ));
        assert!(matches!(
            partners.authenticate(&token("bob", "builder")),
            Err(RealmError::ExpiredCredentials { .. })
        ));
        assert_eq!(partners.authentication_cache_name(), "partners.authenticationCache");
    }

    /// Hashed passwords are salted with the username.
    #[test]
    fn test_sha256_passwords() {
        let digest = sha256_hex(b"s3cret", Some(b"carol"), 1);
        let toml = format!(
            r#"
            name = "vault"

            [[users]]
            username = "carol"
            password_sha256 = "{digest}"
            "#
        );
        let realm = RealmDefinition::from_toml_str(&toml).unwrap().build(None).unwrap();

        assert!(realm.authenticate(&token("carol", "s3cret")).unwrap().is_some());
        assert!(matches!(
            realm.authenticate(&token("carol", "secret")),
            Err(RealmError::IncorrectCredentials { .. })
        ));
    }

    /// One realm cannot mix password forms.
    #[test]
    fn test_mixed_password_forms_rejected() {
        let toml = r#"
            name = "mixed"

            [[users]]
            username = "a"
            password = "x"

            [[users]]
            username = "b"
            password_sha256 = "00"
        "#;
        match RealmDefinition::from_toml_str(toml).unwrap().build(None) {
            Err(RealmError::ConfigError { reason }) => assert!(reason.contains("mixes")),
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }

    /// A user needs a password.
    #[test]
    fn test_user_without_password_rejected() {
        let toml = r#"
            name = "open"

            [[users]]
            username = "a"
        "#;
        assert!(matches!(
            RealmDefinition::from_toml_str(toml).unwrap().build(None),
            Err(RealmError::ConfigError { .. })
        ));
    }

    /// A malformed role permission fails the build.
    #[test]
    fn test_invalid_role_permission_rejected() {
        let toml = r#"
            name = "broken"

            [roles]
            admin = ["user::delete"]
        "#;
        assert!(matches!(
            RealmDefinition::from_toml_str(toml).unwrap().build(None),
            Err(RealmError::InvalidPermission { .. })
        ));
    }

    /// Malformed TOML must produce a `RealmError::ConfigError`.
    #[test]
    fn test_toml_parse_error() {
        let result = RealmsConfig::from_toml_str("this is not valid toml ][[[");
        match result {
            Err(RealmError::ConfigError { reason }) => {
                assert!(reason.contains("failed to parse realm TOML"), "unexpected reason: {}", reason);
            }
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }

    /// A missing file is a configuration error naming the path.
    #[test]
    fn test_missing_file() {
        match RealmsConfig::from_file(Path::new("/nonexistent/realms.toml")) {
            Err(RealmError::ConfigError { reason }) => assert!(reason.contains("/nonexistent/realms.toml")),
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }

    /// A blank realm name is refused.
    #[test]
    fn test_blank_realm_name() {
        let toml = r#"
            [[realms]]
            name = "  "
        "#;
        assert!(matches!(
            RealmsConfig::from_toml_str(toml).unwrap().into_realms(None),
            Err(RealmError::ConfigError { .. })
        ));
    }
}
