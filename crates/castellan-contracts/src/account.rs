//! Accounts and roles as stored by simple backends.
//!
//! An `Account` bundles everything a backend knows about one subject: its
//! principals, stored credentials, granted roles and permissions, and the
//! administrative flags (locked, credential expiry). Realms project it into
//! the two record kinds they hand upward.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::{
    permission::{Permission, SharedPermission},
    principal::{Principal, PrincipalSet},
    record::{AuthenticationRecord, AuthorizationRecord, Credential},
};

/// A subject's complete stored identity.
#[derive(Debug, Clone)]
pub struct Account {
    principals: PrincipalSet,
    credentials: Vec<Credential>,
    authorization: AuthorizationRecord,
    locked: bool,
    credentials_expire_at: Option<DateTime<Utc>>,
}

impl Account {
    /// An account with one principal attributed to `realm` and one credential.
    pub fn new(
        principal: impl Into<Principal>,
        credential: impl Into<Credential>,
        realm: impl Into<String>,
    ) -> Self {
        Self::with_principals(PrincipalSet::of_principal(principal, realm), credential)
    }

    /// An account for an existing principal set.
    pub fn with_principals(principals: PrincipalSet, credential: impl Into<Credential>) -> Self {
        Self {
            principals,
            credentials: vec![credential.into()],
            authorization: AuthorizationRecord::default(),
            locked: false,
            credentials_expire_at: None,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.authorization.add_role(role);
        self
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for role in roles {
            self.authorization.add_role(role);
        }
        self
    }

    pub fn with_string_permission(mut self, permission: impl Into<String>) -> Self {
        self.authorization.add_string_permission(permission);
        self
    }

    pub fn with_string_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for permission in permissions {
            self.authorization.add_string_permission(permission);
        }
        self
    }

    pub fn with_object_permission(mut self, permission: SharedPermission) -> Self {
        self.authorization.add_object_permission(permission);
        self
    }

    /// Mark the account locked. Locked accounts fail authentication even
    /// with correct credentials.
    pub fn with_locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    /// Set the instant after which the stored credentials are no longer accepted.
    pub fn with_credentials_expire_at(mut self, at: DateTime<Utc>) -> Self {
        self.credentials_expire_at = Some(at);
        self
    }

    pub fn principals(&self) -> &PrincipalSet {
        &self.principals
    }

    pub fn credentials(&self) -> &[Credential] {
        &self.credentials
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.authorization.roles().iter().map(String::as_str)
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn credentials_expire_at(&self) -> Option<DateTime<Utc>> {
        self.credentials_expire_at
    }

    /// Return true if the credentials have expired as of `now`.
    pub fn is_credentials_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.credentials_expire_at.is_some_and(|at| at <= now)
    }

    pub fn is_credentials_expired(&self) -> bool {
        self.is_credentials_expired_at(Utc::now())
    }

    /// Project into the record credential matching runs against.
    pub fn authentication_record(&self) -> AuthenticationRecord {
        AuthenticationRecord::with_credentials(self.principals.clone(), self.credentials.iter().cloned())
            .with_locked(self.locked)
            .with_credentials_expire_at(self.credentials_expire_at)
    }

    /// The account's own roles and permissions.
    pub fn authorization_record(&self) -> &AuthorizationRecord {
        &self.authorization
    }
}

/// A named group of permissions.
#[derive(Debug, Clone)]
pub struct Role {
    name: String,
    permissions: HashSet<SharedPermission>,
}

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            permissions: HashSet::new(),
        }
    }

    pub fn with_permission(mut self, permission: SharedPermission) -> Self {
        self.permissions.insert(permission);
        self
    }

    pub fn with_permissions<I>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = SharedPermission>,
    {
        self.permissions.extend(permissions);
        self
    }

    pub fn add_permission(&mut self, permission: SharedPermission) {
        self.permissions.insert(permission);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn permissions(&self) -> &HashSet<SharedPermission> {
        &self.permissions
    }

    /// Return true if any of this role's permissions implies `permission`.
    pub fn is_permitted(&self, permission: &dyn Permission) -> bool {
        self.permissions.iter().any(|p| p.implies(permission))
    }
}
