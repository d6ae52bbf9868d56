//! # castellan-core
//!
//! The realm engine for Castellan.
//!
//! This crate provides:
//! - The collaborator traits (`Realm`, `Authorizer`, `Cache`, `CacheManager`,
//!   `AccountStore`, the resolvers, `CredentialsMatcher` and the lookup strategies)
//! - `StandardRealm`, which composes them into cached authentication and the
//!   permission/role decision engine
//!
//! ## Usage
//!
//! ```rust,ignore
//! use castellan_core::{StandardRealm, traits::{Authorizer, Realm}};
//!
//! let realm = StandardRealm::builder("corporate")
//!     .authorization_lookup(directory_lookup)
//!     .permission_resolver(resolver)
//!     .cache_manager(caches)
//!     .build()?;
//! realm.check_permission(&principals, &"report:read".into())?;
//! ```

mod cache;
pub mod realm;
pub mod traits;

pub use realm::{StandardRealm, StandardRealmBuilder};
pub use traits::{
    AccountStore, AuthenticationCache, AuthenticationLookup, AuthorizationCache, AuthorizationLookup,
    Authorizer, Cache, CacheKey, CacheManager, CredentialsMatcher, PermissionResolver, Realm,
    RealmCacheManager, RolePermissionResolver,
};

// ── Tests ─────────────────────────────────────────────────────────────────────
