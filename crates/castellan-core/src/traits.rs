//! Collaborator trait definitions for the Castellan realm engine.
//!
//! The engine is assembled from these seams:
//!
//! - `Realm`                  : a named identity backend (authentication entry point)
//! - `Authorizer`             : the permission and role decision surface
//! - `Cache` / `CacheManager` : keyed record storage scoped per (realm, purpose)
//! - `AccountStore`           : a simple account lookup backend
//! - `PermissionResolver`     : permission string → permission object
//! - `RolePermissionResolver` : role name → granted permissions
//! - `CredentialsMatcher`     : submitted vs. stored credential comparison
//! - `AuthenticationLookup` / `AuthorizationLookup` : the backend-specific fetch
//!   step that `StandardRealm` wraps in its cache-check → fetch → cache-store routine
//!
//! Every trait is `Send + Sync`: realms are built once and then shared by
//! many caller threads for the life of the process.

use std::{fmt, sync::Arc};

use castellan_contracts::{
    account::Account,
    error::{RealmError, RealmResult},
    permission::{PermissionRequest, SharedPermission},
    principal::{Principal, PrincipalSet},
    record::{AuthenticationRecord, AuthorizationRecord},
    token::AuthenticationToken,
};

// ── Realm ─────────────────────────────────────────────────────────────────────

/// A named, long-lived identity backend.
///
/// Implementations are configured once and then called concurrently. A realm
/// that also makes authorization decisions exposes them through
/// `as_authorizer()`.
pub trait Realm: Send + Sync {
    /// The realm's unique name. Principal sets attribute principals by it.
    fn name(&self) -> &str;

    /// Return true if this realm accepts tokens of this shape.
    fn supports(&self, token: &AuthenticationToken) -> bool;

    /// Verify `token` and return the matching record.
    ///
    /// `Ok(None)` means the account is unknown to this realm; that is a
    /// normal outcome, not a failure. Mismatched, locked or expired
    /// credentials are returned as errors.
    fn authenticate(&self, token: &AuthenticationToken) -> RealmResult<Option<AuthenticationRecord>>;

    /// Drop whatever this realm cached for a subject that is logging out.
    fn on_logout(&self, _principals: &PrincipalSet) -> RealmResult<()> {
        Ok(())
    }

    /// The realm's decision surface, if it has one.
    fn as_authorizer(&self) -> Option<&dyn Authorizer> {
        None
    }
}

// ── Authorizer ────────────────────────────────────────────────────────────────

/// Permission and role decisions for a principal set.
///
/// `is_*` and `has_*` return `Ok(false)` for a normal denial; they only fail
/// when a collaborator fails or a permission string cannot be resolved.
/// `check_*` return `Ok(())` when granted and `RealmError::Unauthorized` when
/// denied.
///
/// Only `is_permitted` and `has_role` are required. The batch and `check_*`
/// forms default to calling the single forms; implementations that can fetch
/// the subject's data once per call should override them.
pub trait Authorizer: Send + Sync {
    /// Return true if any permission granted to `principals` implies `permission`.
    fn is_permitted(&self, principals: &PrincipalSet, permission: &PermissionRequest) -> RealmResult<bool>;

    /// Return true if `principals` holds `role`.
    fn has_role(&self, principals: &PrincipalSet, role: &str) -> RealmResult<bool>;

    /// Evaluate every request independently; the result has the same length
    /// and order as `permissions`.
    fn is_permitted_each(
        &self,
        principals: &PrincipalSet,
        permissions: &[PermissionRequest],
    ) -> RealmResult<Vec<bool>> {
        permissions
            .iter()
            .map(|permission| self.is_permitted(principals, permission))
            .collect()
    }

    /// Return true if every request is permitted. Stops at the first denial.
    fn is_permitted_all(
        &self,
        principals: &PrincipalSet,
        permissions: &[PermissionRequest],
    ) -> RealmResult<bool> {
        for permission in permissions {
            if !self.is_permitted(principals, permission)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Like `is_permitted`, but a denial is an error.
    fn check_permission(&self, principals: &PrincipalSet, permission: &PermissionRequest) -> RealmResult<()> {
        if self.is_permitted(principals, permission)? {
            Ok(())
        } else {
            Err(permission_denied(principals, permission))
        }
    }

    /// Check each request in order, failing on the first denial.
    fn check_permissions(
        &self,
        principals: &PrincipalSet,
        permissions: &[PermissionRequest],
    ) -> RealmResult<()> {
        for permission in permissions {
            self.check_permission(principals, permission)?;
        }
        Ok(())
    }

    /// Evaluate every role independently, preserving order.
    fn has_roles(&self, principals: &PrincipalSet, roles: &[&str]) -> RealmResult<Vec<bool>> {
        roles.iter().map(|role| self.has_role(principals, role)).collect()
    }

    /// Return true if every role is held. Stops at the first missing role.
    fn has_all_roles(&self, principals: &PrincipalSet, roles: &[&str]) -> RealmResult<bool> {
        for role in roles {
            if !self.has_role(principals, role)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Like `has_role`, but a missing role is an error.
    fn check_role(&self, principals: &PrincipalSet, role: &str) -> RealmResult<()> {
        if self.has_role(principals, role)? {
            Ok(())
        } else {
            Err(role_denied(principals, role))
        }
    }

    /// Check each role in order, failing on the first missing one.
    fn check_roles(&self, principals: &PrincipalSet, roles: &[&str]) -> RealmResult<()> {
        for role in roles {
            self.check_role(principals, role)?;
        }
        Ok(())
    }
}

/// The `Unauthorized` error raised when a permission check is denied.
pub fn permission_denied(principals: &PrincipalSet, permission: &dyn fmt::Display) -> RealmError {
    RealmError::Unauthorized {
        reason: format!("subject [{}] does not have permission [{}]", principals, permission),
    }
}

/// The `Unauthorized` error raised when a role check is denied.
pub fn role_denied(principals: &PrincipalSet, role: &str) -> RealmError {
    RealmError::Unauthorized {
        reason: format!("subject [{}] does not have role [{}]", principals, role),
    }
}

// ── Caching ───────────────────────────────────────────────────────────────────

/// The key a cached record is stored under.
///
/// Derived from a token or principal set by a key resolver. The principal-set
/// form relies on `PrincipalSet`'s structural equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Principals(PrincipalSet),
    Principal(Principal),
    Text(String),
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Principals(set) => write!(f, "principals[{}]", set),
            Self::Principal(principal) => write!(f, "principal[{}]", principal),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// A keyed store of records.
///
/// The engine assumes per-key atomicity of `get`, `put` and `remove`, and
/// nothing more: a miss followed by a concurrent identical miss may fetch
/// from the backend twice. Eviction is the implementation's own business.
pub trait Cache<V>: Send + Sync {
    fn get(&self, key: &CacheKey) -> RealmResult<Option<V>>;

    fn put(&self, key: CacheKey, value: V) -> RealmResult<()>;

    /// Remove the entry for `key`, returning the previous value if present.
    fn remove(&self, key: &CacheKey) -> RealmResult<Option<V>>;
}

/// Hands out caches by name.
///
/// Must be idempotent: asking twice for the same name returns the same cache.
pub trait CacheManager<V>: Send + Sync {
    fn get_cache(&self, name: &str) -> Arc<dyn Cache<V>>;
}

/// Cached authentication records.
pub type AuthenticationCache = dyn Cache<Arc<AuthenticationRecord>>;

/// Cached authorization records.
pub type AuthorizationCache = dyn Cache<Arc<AuthorizationRecord>>;

/// A cache manager able to serve both record caches a realm needs.
///
/// Implemented automatically for every type that manages both value types.
pub trait RealmCacheManager:
    CacheManager<Arc<AuthenticationRecord>> + CacheManager<Arc<AuthorizationRecord>>
{
}

impl<T> RealmCacheManager for T where
    T: CacheManager<Arc<AuthenticationRecord>> + CacheManager<Arc<AuthorizationRecord>>
{
}

// ── Backends ──────────────────────────────────────────────────────────────────

/// A simple account backend.
pub trait AccountStore: Send + Sync {
    /// Find the account `token` claims. `Ok(None)` if there is none.
    fn lookup(&self, token: &AuthenticationToken) -> RealmResult<Option<Account>>;

    /// Roles and permissions for `principals`, for stores that also serve
    /// authorization data.
    fn authorization(&self, _principals: &PrincipalSet) -> RealmResult<Option<AuthorizationRecord>> {
        Ok(None)
    }
}

/// The backend-specific fetch step of authentication.
///
/// Implemented for any `Fn(&AuthenticationToken) -> RealmResult<Option<AuthenticationRecord>>`.
pub trait AuthenticationLookup: Send + Sync {
    fn lookup(&self, token: &AuthenticationToken) -> RealmResult<Option<AuthenticationRecord>>;
}

impl<F> AuthenticationLookup for F
where
    F: Fn(&AuthenticationToken) -> RealmResult<Option<AuthenticationRecord>> + Send + Sync,
{
    fn lookup(&self, token: &AuthenticationToken) -> RealmResult<Option<AuthenticationRecord>> {
        self(token)
    }
}

/// The backend-specific fetch step of authorization.
///
/// Implemented for any `Fn(&PrincipalSet) -> RealmResult<Option<AuthorizationRecord>>`.
pub trait AuthorizationLookup: Send + Sync {
    fn lookup(&self, principals: &PrincipalSet) -> RealmResult<Option<AuthorizationRecord>>;
}

impl<F> AuthorizationLookup for F
where
    F: Fn(&PrincipalSet) -> RealmResult<Option<AuthorizationRecord>> + Send + Sync,
{
    fn lookup(&self, principals: &PrincipalSet) -> RealmResult<Option<AuthorizationRecord>> {
        self(principals)
    }
}

// ── Decision collaborators ────────────────────────────────────────────────────

/// Turns a permission string into a permission object.
pub trait PermissionResolver: Send + Sync {
    /// Returns `RealmError::InvalidPermission` if the string cannot be parsed.
    fn resolve(&self, permission: &str) -> RealmResult<SharedPermission>;
}

/// Expands a role name into the permissions it grants.
pub trait RolePermissionResolver: Send + Sync {
    /// An unknown role grants nothing and yields an empty list.
    fn resolve_permissions_in_role(&self, role: &str) -> RealmResult<Vec<SharedPermission>>;
}

/// Compares the credential in a token with the credentials a backend stored.
pub trait CredentialsMatcher: Send + Sync {
    fn matches(&self, token: &AuthenticationToken, record: &AuthenticationRecord) -> bool;
}
