//! The `Permission` capability trait.
//!
//! Every authorization decision reduces to one primitive: does a granted
//! permission imply a requested one. How a permission answers that (wildcard
//! hierarchies, ACL bitmasks, …) is the implementor's business.
//!
//! Granted permissions are shared as `Arc<dyn Permission>` and collected into
//! hash sets, so trait objects need structural equality. `PermissionEq` is
//! implemented for every `Eq + Hash` type and gives `dyn Permission` its
//! `PartialEq`, `Eq` and `Hash` impls: two trait objects are equal when they
//! have the same concrete type and compare equal as that type.

use std::{
    any::{Any, TypeId},
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

/// Object-safe equality and hashing for permission trait objects.
///
/// Blanket-implemented; never implement it by hand.
pub trait PermissionEq: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn eq_dyn(&self, other: &dyn Any) -> bool;
    fn hash_dyn(&self, state: &mut dyn Hasher);
}

impl<T> PermissionEq for T
where
    T: Any + Eq + Hash + Send + Sync,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_dyn(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<T>().is_some_and(|other| self == other)
    }

    fn hash_dyn(&self, mut state: &mut dyn Hasher) {
        TypeId::of::<T>().hash(&mut state);
        self.hash(&mut state);
    }
}

/// A granted or requested capability.
pub trait Permission: PermissionEq + fmt::Debug + fmt::Display {
    /// Return true if holding `self` grants `other`.
    fn implies(&self, other: &dyn Permission) -> bool;
}

/// How permissions are shared between records, resolvers and callers.
pub type SharedPermission = Arc<dyn Permission>;

impl dyn Permission {
    /// Downcast to a concrete permission type.
    pub fn downcast_ref<T: Permission>(&self) -> Option<&T> {
        PermissionEq::as_any(self).downcast_ref::<T>()
    }
}

impl PartialEq for dyn Permission {
    fn eq(&self, other: &Self) -> bool {
        PermissionEq::eq_dyn(self, PermissionEq::as_any(other))
    }
}

impl Eq for dyn Permission {}

impl Hash for dyn Permission {
    fn hash<H: Hasher>(&self, state: &mut H) {
        PermissionEq::hash_dyn(self, state);
    }
}

/// A permission named in an authorization request.
///
/// Either an already-resolved permission object, or a string the deciding
/// realm resolves through its own `PermissionResolver`.
#[derive(Debug, Clone)]
pub enum PermissionRequest {
    Resolved(SharedPermission),
    Unresolved(String),
}

impl fmt::Display for PermissionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolved(permission) => fmt::Display::fmt(permission, f),
            Self::Unresolved(text) => f.write_str(text),
        }
    }
}

impl From<&str> for PermissionRequest {
    fn from(text: &str) -> Self {
        Self::Unresolved(text.to_string())
    }
}

impl From<String> for PermissionRequest {
    fn from(text: String) -> Self {
        Self::Unresolved(text)
    }
}

impl From<SharedPermission> for PermissionRequest {
    fn from(permission: SharedPermission) -> Self {
        Self::Resolved(permission)
    }
}
