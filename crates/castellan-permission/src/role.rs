//! Role → permission expansion from a fixed table.

use std::collections::HashMap;

use tracing::debug;

use castellan_contracts::{error::RealmResult, permission::SharedPermission};
use castellan_core::traits::{PermissionResolver, RolePermissionResolver};

/// A `RolePermissionResolver` backed by an in-memory table.
///
/// Permission strings are resolved once, when the table is built, so a
/// malformed entry fails configuration instead of the first decision that
/// touches the role.
#[derive(Debug, Clone, Default)]
pub struct MapRolePermissionResolver {
    roles: HashMap<String, Vec<SharedPermission>>,
}

impl MapRolePermissionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from role → permission-string pairs.
    ///
    /// # Errors
    ///
    /// The first error `resolver` reports for any permission string.
    pub fn from_strings<I, R, P, S>(roles: I, resolver: &dyn PermissionResolver) -> RealmResult<Self>
    where
        I: IntoIterator<Item = (R, P)>,
        R: Into<String>,
        P: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = Self::new();
        for (role, permissions) in roles {
            let resolved = permissions
                .into_iter()
                .map(|p| resolver.resolve(p.as_ref()))
                .collect::<RealmResult<Vec<_>>>()?;
            table = table.with_role(role, resolved);
        }
        debug!(roles = table.roles.len(), "role permission table built");
        Ok(table)
    }

    /// Grant `permissions` to `role`, adding to anything it already grants.
    pub fn with_role(mut self, role: impl Into<String>, permissions: Vec<SharedPermission>) -> Self {
        self.roles.entry(role.into()).or_default().extend(permissions);
        self
    }

    pub fn contains_role(&self, role: &str) -> bool {
        self.roles.contains_key(role)
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

impl RolePermissionResolver for MapRolePermissionResolver {
    fn resolve_permissions_in_role(&self, role: &str) -> RealmResult<Vec<SharedPermission>> {
        Ok(self.roles.get(role).cloned().unwrap_or_default())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
