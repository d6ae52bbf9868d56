//! Wildcard permissions.
//!
//! A permission string is a `:`-separated list of parts; each part is a
//! `,`-separated set of subparts; `*` in a part matches anything:
//!
//! ```text
//! printer:print,query:lp7200
//! newsletter:*:read
//! user
//! ```
//!
//! A granted permission implies a requested one when, part by part, each
//! granted part is `*` or contains every subpart of the requested part.
//! Parts missing from the end of the granted permission are implied
//! wildcards, so `user` implies `user:delete:42`. Extra granted parts must
//! all be `*`.
//!
//! Matching is case-insensitive unless the permission is built case-sensitive.

use std::{collections::BTreeSet, fmt, sync::Arc};

use castellan_contracts::{
    error::{RealmError, RealmResult},
    permission::{Permission, SharedPermission},
};
use castellan_core::traits::PermissionResolver;

/// Matches any subpart.
pub const WILDCARD_TOKEN: &str = "*";

/// Separates parts.
pub const PART_DIVIDER: char = ':';

/// Separates subparts within a part.
pub const SUBPART_DIVIDER: char = ',';

/// A parsed `part:part,subpart:…` permission.
///
/// Two permissions are equal when their parts hold the same subparts,
/// regardless of subpart order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WildcardPermission {
    parts: Vec<BTreeSet<String>>,
}

impl WildcardPermission {
    /// Parse a case-insensitive permission.
    pub fn new(text: &str) -> RealmResult<Self> {
        Self::parse(text, false)
    }

    /// Parse a permission, keeping case when `case_sensitive` is true.
    ///
    /// # Errors
    ///
    /// `RealmError::InvalidPermission` for a blank string, or one with an
    /// empty part or subpart (`a::b`, `a:,b`).
    pub fn parse(text: &str, case_sensitive: bool) -> RealmResult<Self> {
        let invalid = |reason: &str| RealmError::InvalidPermission {
            permission: text.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(invalid("permission string cannot be empty"));
        }
        let normalized = if case_sensitive {
            trimmed.to_string()
        } else {
            trimmed.to_lowercase()
        };

        let mut parts = Vec::new();
        for part in normalized.split(PART_DIVIDER) {
            let subparts: BTreeSet<String> = part
                .split(SUBPART_DIVIDER)
                .map(|s| s.trim().to_string())
                .collect();
            if subparts.iter().any(String::is_empty) {
                return Err(invalid("permission parts and subparts cannot be empty"));
            }
            parts.push(subparts);
        }

        Ok(Self { parts })
    }

    pub fn parts(&self) -> &[BTreeSet<String>] {
        &self.parts
    }

    fn is_wildcard(part: &BTreeSet<String>) -> bool {
        part.contains(WILDCARD_TOKEN)
    }

    /// Return true if `self` grants `other`.
    pub fn implies_wildcard(&self, other: &WildcardPermission) -> bool {
        for (i, requested) in other.parts.iter().enumerate() {
            // Granted permission is shorter: its missing tail is implied.
            let Some(granted) = self.parts.get(i) else {
                return true;
            };
            if !Self::is_wildcard(granted) && !granted.is_superset(requested) {
                return false;
            }
        }
        self.parts
            .iter()
            .skip(other.parts.len())
            .all(Self::is_wildcard)
    }
}

impl fmt::Display for WildcardPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", PART_DIVIDER)?;
            }
            let joined = part.iter().map(String::as_str).collect::<Vec<_>>().join(",");
            f.write_str(&joined)?;
        }
        Ok(())
    }
}

impl Permission for WildcardPermission {
    /// Only another `WildcardPermission` can be implied.
    fn implies(&self, other: &dyn Permission) -> bool {
        other
            .downcast_ref::<WildcardPermission>()
            .is_some_and(|other| self.implies_wildcard(other))
    }
}

// ── Resolver ──────────────────────────────────────────────────────────────────

/// Resolves permission strings into `WildcardPermission`s.
#[derive(Debug, Clone, Copy, Default)]
pub struct WildcardPermissionResolver {
    case_sensitive: bool,
}

impl WildcardPermissionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }
}

impl PermissionResolver for WildcardPermissionResolver {
    fn resolve(&self, permission: &str) -> RealmResult<SharedPermission> {
        Ok(Arc::new(WildcardPermission::parse(permission, self.case_sensitive)?))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
