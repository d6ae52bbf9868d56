//! # castellan-permission
//!
//! Permission implementations and resolvers for Castellan realms.
//!
//! ## Overview
//!
//! - [`WildcardPermission`]: the `part:subpart,subpart:…` permission model
//!   with `*` wildcards and implied trailing parts
//! - [`WildcardPermissionResolver`]: turns permission strings from records
//!   and requests into `WildcardPermission`s
//! - [`MapRolePermissionResolver`]: a fixed role → permissions table
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use castellan_permission::WildcardPermissionResolver;
//!
//! let realm = StandardRealm::builder("corporate")
//!     .permission_resolver(Arc::new(WildcardPermissionResolver::new()))
//!     .build()?;
//! ```

pub mod role;
pub mod wildcard;

pub use role::MapRolePermissionResolver;
pub use wildcard::{WildcardPermission, WildcardPermissionResolver};
