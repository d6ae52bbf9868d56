//! Authentication and authorization records returned by realms.

use std::{
    collections::{BTreeSet, HashSet},
    fmt,
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{
    permission::SharedPermission,
    principal::{Principal, PrincipalSet},
};

// ── Credential ────────────────────────────────────────────────────────────────

/// Stored credential material (a password, a hex digest, a key).
///
/// Zeroized on drop. `Debug` never prints the bytes.
#[derive(Clone, PartialEq, Eq, Hash, Zeroize, ZeroizeOnDrop)]
pub struct Credential(Vec<u8>);

impl Credential {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

impl From<&str> for Credential {
    fn from(text: &str) -> Self {
        Self(text.as_bytes().to_vec())
    }
}

impl From<String> for Credential {
    fn from(text: String) -> Self {
        Self(text.into_bytes())
    }
}

impl From<Vec<u8>> for Credential {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Credential {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

// ── AuthenticationRecord ──────────────────────────────────────────────────────

/// Verified identity plus the credentials a backend holds for it.
///
/// Records from several realms merge into one: principal sets are combined
/// and distinct credentials accumulate. The account status flags travel with
/// the record so a cached copy is checked exactly like a fresh one.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuthenticationRecord {
    principals: PrincipalSet,
    #[serde(skip)]
    credentials: Vec<Credential>,
    locked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    credentials_expire_at: Option<DateTime<Utc>>,
}

impl AuthenticationRecord {
    /// A record for `principals` with a single stored credential.
    pub fn new(principals: PrincipalSet, credential: impl Into<Credential>) -> Self {
        Self {
            principals,
            credentials: vec![credential.into()],
            locked: false,
            credentials_expire_at: None,
        }
    }

    /// A record for one principal attributed to `realm`.
    pub fn for_principal(
        principal: impl Into<Principal>,
        realm: impl Into<String>,
        credential: impl Into<Credential>,
    ) -> Self {
        Self::new(PrincipalSet::of_principal(principal, realm), credential)
    }

    /// A record holding several credentials (duplicates are dropped).
    pub fn with_credentials<I, C>(principals: PrincipalSet, credentials: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Credential>,
    {
        let mut record = Self {
            principals,
            ..Self::default()
        };
        for credential in credentials {
            record.add_credential(credential.into());
        }
        record
    }

    pub fn with_locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    pub fn with_credentials_expire_at(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.credentials_expire_at = at;
        self
    }

    pub fn principals(&self) -> &PrincipalSet {
        &self.principals
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn credentials_expire_at(&self) -> Option<DateTime<Utc>> {
        self.credentials_expire_at
    }

    /// Return true if the stored credentials have expired as of `now`.
    pub fn is_credentials_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.credentials_expire_at.is_some_and(|at| at <= now)
    }

    pub fn credentials(&self) -> &[Credential] {
        &self.credentials
    }

    /// The first stored credential, if any.
    pub fn credential(&self) -> Option<&Credential> {
        self.credentials.first()
    }

    /// Return true if no principal is attached.
    pub fn is_empty(&self) -> bool {
        self.principals.is_empty()
    }

    fn add_credential(&mut self, credential: Credential) {
        if !self.credentials.contains(&credential) {
            self.credentials.push(credential);
        }
    }

    /// Fold another realm's record into this one.
    ///
    /// A record with no principals contributes nothing. Status flags are not
    /// merged: each realm checks its own record before aggregation.
    pub fn merge(&mut self, other: &AuthenticationRecord) {
        if other.is_empty() {
            return;
        }
        self.principals = self.principals.merge(&other.principals);
        for credential in &other.credentials {
            self.add_credential(credential.clone());
        }
    }
}

// ── AuthorizationRecord ───────────────────────────────────────────────────────

/// Role and permission data for one subject.
///
/// `string_permissions` still need resolving into permission objects by the
/// deciding realm; `object_permissions` are already resolved.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationRecord {
    roles: BTreeSet<String>,
    string_permissions: BTreeSet<String>,
    object_permissions: HashSet<SharedPermission>,
}

impl AuthorizationRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn with_string_permission(mut self, permission: impl Into<String>) -> Self {
        self.string_permissions.insert(permission.into());
        self
    }

    pub fn with_string_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.string_permissions
            .extend(permissions.into_iter().map(Into::into));
        self
    }

    pub fn with_object_permission(mut self, permission: SharedPermission) -> Self {
        self.object_permissions.insert(permission);
        self
    }

    pub fn with_object_permissions<I>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = SharedPermission>,
    {
        self.object_permissions.extend(permissions);
        self
    }

    pub fn add_role(&mut self, role: impl Into<String>) {
        self.roles.insert(role.into());
    }

    pub fn add_string_permission(&mut self, permission: impl Into<String>) {
        self.string_permissions.insert(permission.into());
    }

    pub fn add_object_permission(&mut self, permission: SharedPermission) {
        self.object_permissions.insert(permission);
    }

    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    pub fn string_permissions(&self) -> &BTreeSet<String> {
        &self.string_permissions
    }

    pub fn object_permissions(&self) -> &HashSet<SharedPermission> {
        &self.object_permissions
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Return true if the record grants nothing at all.
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty() && self.string_permissions.is_empty() && self.object_permissions.is_empty()
    }

    /// Union another record into this one.
    pub fn merge(&mut self, other: &AuthorizationRecord) {
        self.roles.extend(other.roles.iter().cloned());
        self.string_permissions
            .extend(other.string_permissions.iter().cloned());
        self.object_permissions
            .extend(other.object_permissions.iter().cloned());
    }
}
