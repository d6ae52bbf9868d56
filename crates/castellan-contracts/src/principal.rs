//! Principals and realm-partitioned principal sets.
//!
//! A `PrincipalSet` is the identity handle every realm operation works from.
//! It is immutable once built, groups principals under the realm that
//! contributed them, and compares structurally so it can key a cache.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    hash::{Hash, Hasher},
    sync::{Arc, OnceLock},
};

use serde::{ser::SerializeMap, Deserialize, Serialize, Serializer};
use uuid::Uuid;

/// An identifying attribute of a subject, as supplied by a backend.
///
/// Realms and callers never take ownership semantics from a principal; it is
/// a plain value compared by equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Principal {
    /// A login name (e.g. "alice").
    Username(String),
    /// A numeric account identifier.
    Id(i64),
    /// A UUID-valued account identifier.
    Uuid(Uuid),
    /// An e-mail address.
    Email(String),
    /// Any other named attribute a backend wants to attach.
    Attribute { name: String, value: String },
}

/// The shape of a `Principal`, used for typed lookups in a `PrincipalSet`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    Username,
    Id,
    Uuid,
    Email,
    Attribute,
}

impl Principal {
    /// Construct a `Principal::Username` from any string-like value.
    pub fn username(name: impl Into<String>) -> Self {
        Self::Username(name.into())
    }

    /// Construct a `Principal::Email` from any string-like value.
    pub fn email(address: impl Into<String>) -> Self {
        Self::Email(address.into())
    }

    /// Construct a `Principal::Attribute`.
    pub fn attribute(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Attribute {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Return the shape of this principal.
    pub fn kind(&self) -> PrincipalKind {
        match self {
            Self::Username(_) => PrincipalKind::Username,
            Self::Id(_) => PrincipalKind::Id,
            Self::Uuid(_) => PrincipalKind::Uuid,
            Self::Email(_) => PrincipalKind::Email,
            Self::Attribute { .. } => PrincipalKind::Attribute,
        }
    }

    /// Return the string value for textual principals (username, e-mail,
    /// attribute value), or `None` for numeric and UUID principals.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Username(s) | Self::Email(s) => Some(s),
            Self::Attribute { value, .. } => Some(value),
            Self::Id(_) | Self::Uuid(_) => None,
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Username(name) => f.write_str(name),
            Self::Id(id) => write!(f, "{id}"),
            Self::Uuid(id) => write!(f, "{id}"),
            Self::Email(address) => f.write_str(address),
            Self::Attribute { name, value } => write!(f, "{name}={value}"),
        }
    }
}

impl From<&str> for Principal {
    fn from(name: &str) -> Self {
        Self::Username(name.to_string())
    }
}

impl From<String> for Principal {
    fn from(name: String) -> Self {
        Self::Username(name)
    }
}

impl From<i64> for Principal {
    fn from(id: i64) -> Self {
        Self::Id(id)
    }
}

impl From<Uuid> for Principal {
    fn from(id: Uuid) -> Self {
        Self::Uuid(id)
    }
}

// ── PrincipalSet ──────────────────────────────────────────────────────────────

/// The principals one realm contributed, in insertion order, never empty.
#[derive(Debug, Clone)]
struct RealmPrincipals {
    realm: String,
    principals: Vec<Principal>,
}

/// An immutable, realm-partitioned aggregate of the principals for one subject.
///
/// Realms and the principals within each realm keep their insertion order.
/// A realm with no principals is never stored. Equality and hashing are
/// defined over the realm → principal-set mapping and ignore ordering, so two
/// independently built sets with the same content compare equal and can be
/// used interchangeably as cache keys.
///
/// Cloning is cheap: the contents are shared behind an `Arc`.
#[derive(Clone, Default)]
pub struct PrincipalSet {
    realms: Arc<Vec<RealmPrincipals>>,
    display: Arc<OnceLock<String>>,
}

impl PrincipalSet {
    /// The empty principal set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Start building a principal set.
    pub fn builder() -> PrincipalSetBuilder {
        PrincipalSetBuilder::default()
    }

    /// Build a set holding `principals`, all attributed to `realm`.
    ///
    /// An empty collection yields the empty set.
    pub fn of_realm<I, P>(realm: impl Into<String>, principals: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Principal>,
    {
        Self::builder().add_principals(realm, principals).build()
    }

    /// Build a set holding a single principal attributed to `realm`.
    pub fn of_principal(principal: impl Into<Principal>, realm: impl Into<String>) -> Self {
        Self::builder().add_principal(realm, principal).build()
    }

    /// Return a new set holding this set's principals followed by `other`'s.
    ///
    /// Realm order and per-realm principal order are preserved from both sides.
    pub fn merge(&self, other: &PrincipalSet) -> PrincipalSet {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }
        Self::builder().add_all(self).add_all(other).build()
    }

    /// The first principal under realm-then-principal insertion order.
    pub fn primary_principal(&self) -> Option<&Principal> {
        self.realms.first().and_then(|r| r.principals.first())
    }

    /// The first principal of the requested shape, scanning realms in order.
    pub fn one_of_kind(&self, kind: PrincipalKind) -> Option<&Principal> {
        self.iter().find(|p| p.kind() == kind)
    }

    /// Every principal of the requested shape, scanning realms in order.
    pub fn all_of_kind(&self, kind: PrincipalKind) -> Vec<&Principal> {
        self.iter().filter(|p| p.kind() == kind).collect()
    }

    /// The principals contributed by `realm`, or an empty slice.
    pub fn from_realm(&self, realm: &str) -> &[Principal] {
        self.realms
            .iter()
            .find(|r| r.realm == realm)
            .map(|r| r.principals.as_slice())
            .unwrap_or(&[])
    }

    /// The principal a given realm should treat as authoritative.
    ///
    /// Prefers the first principal this set attributes to `realm`; if that
    /// realm contributed nothing, falls back to the overall primary principal.
    pub fn available_principal(&self, realm: &str) -> Option<&Principal> {
        self.from_realm(realm)
            .first()
            .or_else(|| self.primary_principal())
    }

    /// Names of every realm that contributed at least one principal, in order.
    pub fn realm_names(&self) -> impl Iterator<Item = &str> {
        self.realms.iter().map(|r| r.realm.as_str())
    }

    /// Return true if no realm contributed any principal.
    pub fn is_empty(&self) -> bool {
        self.realms.is_empty()
    }

    /// Total number of principal entries across every realm.
    pub fn len(&self) -> usize {
        self.realms.iter().map(|r| r.principals.len()).sum()
    }

    /// Iterate every principal in realm-then-principal order.
    ///
    /// A principal contributed by two realms is yielded twice.
    pub fn iter(&self) -> impl Iterator<Item = &Principal> {
        self.realms.iter().flat_map(|r| r.principals.iter())
    }

    /// The distinct principals of this set, in first-seen order.
    pub fn distinct(&self) -> Vec<&Principal> {
        let mut seen = BTreeSet::new();
        self.iter().filter(|p| seen.insert(*p)).collect()
    }

    /// Order-insensitive view used for equality and hashing.
    fn canonical(&self) -> BTreeMap<&str, BTreeSet<&Principal>> {
        self.realms
            .iter()
            .map(|r| (r.realm.as_str(), r.principals.iter().collect()))
            .collect()
    }
}

impl PartialEq for PrincipalSet {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.realms, &other.realms) || self.canonical() == other.canonical()
    }
}

impl Eq for PrincipalSet {}

impl Hash for PrincipalSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical().hash(state);
    }
}

impl fmt::Display for PrincipalSet {
    /// Comma-separated distinct principals, or `empty`.
    ///
    /// Computed once and memoized. Two threads racing on the first call may
    /// both compute it; the result is identical either way.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self.display.get_or_init(|| {
            let distinct = self.distinct();
            if distinct.is_empty() {
                "empty".to_string()
            } else {
                distinct
                    .iter()
                    .map(|p| p.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            }
        });
        f.write_str(rendered)
    }
}

impl fmt::Debug for PrincipalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrincipalSet ")?;
        f.debug_map()
            .entries(self.realms.iter().map(|r| (&r.realm, &r.principals)))
            .finish()
    }
}

impl Serialize for PrincipalSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.realms.len()))?;
        for entry in self.realms.iter() {
            map.serialize_entry(&entry.realm, &entry.principals)?;
        }
        map.end()
    }
}

// ── Builder ───────────────────────────────────────────────────────────────────

/// Accumulates realm → principal associations and yields an immutable
/// `PrincipalSet` snapshot.
///
/// Realms that end up with no principals are dropped by `build()`.
#[derive(Debug, Clone, Default)]
pub struct PrincipalSetBuilder {
    realms: Vec<(String, Vec<Principal>)>,
}

impl PrincipalSetBuilder {
    fn entry(&mut self, realm: String) -> &mut Vec<Principal> {
        let index = match self.realms.iter().position(|(name, _)| *name == realm) {
            Some(index) => index,
            None => {
                self.realms.push((realm, Vec::new()));
                self.realms.len() - 1
            }
        };
        &mut self.realms[index].1
    }

    /// Register `realm` without adding a principal to it.
    ///
    /// Fixes the realm's position in the ordering should principals be added
    /// later; otherwise the realm is absent from the built set.
    pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
        self.entry(realm.into());
        self
    }

    /// Append `principal` to `realm`. Duplicates within a realm are ignored.
    pub fn add_principal(mut self, realm: impl Into<String>, principal: impl Into<Principal>) -> Self {
        let principal = principal.into();
        let principals = self.entry(realm.into());
        if !principals.contains(&principal) {
            principals.push(principal);
        }
        self
    }

    /// Append every principal of `principals` to `realm`, in order.
    pub fn add_principals<I, P>(mut self, realm: impl Into<String>, principals: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Principal>,
    {
        let existing = self.entry(realm.into());
        for principal in principals {
            let principal = principal.into();
            if !existing.contains(&principal) {
                existing.push(principal);
            }
        }
        self
    }

    /// Append every realm and principal of another set, preserving its order.
    pub fn add_all(mut self, set: &PrincipalSet) -> Self {
        for entry in set.realms.iter() {
            self = self.add_principals(entry.realm.clone(), entry.principals.iter().cloned());
        }
        self
    }

    /// Return true if no principal has been added yet.
    pub fn is_empty(&self) -> bool {
        self.realms.iter().all(|(_, principals)| principals.is_empty())
    }

    /// Produce the immutable snapshot.
    pub fn build(self) -> PrincipalSet {
        let realms: Vec<RealmPrincipals> = self
            .realms
            .into_iter()
            .filter(|(_, principals)| !principals.is_empty())
            .map(|(realm, principals)| RealmPrincipals { realm, principals })
            .collect();
        PrincipalSet {
            realms: Arc::new(realms),
            display: Arc::new(OnceLock::new()),
        }
    }
}
