//! Error types for realm authentication and authorization.
//!
//! All fallible operations in the Castellan crates return `RealmResult<T>`.
//! A missing account or record is never an error: realms return `Ok(None)`
//! and authorizers return `Ok(false)`. Errors are reserved for wrong or
//! unusable credentials, denied `check*` calls, bad configuration and
//! collaborator failures.

use thiserror::Error;

/// The unified error type for Castellan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RealmError {
    /// The submitted credential did not match the stored credential.
    #[error("submitted credentials for '{principal}' did not match the stored credentials")]
    IncorrectCredentials { principal: String },

    /// The stored credentials are past their expiry.
    #[error("credentials for '{principal}' have expired")]
    ExpiredCredentials { principal: String },

    /// The account exists but is locked.
    #[error("account '{principal}' is locked")]
    LockedAccount { principal: String },

    /// No account exists for the submitted principal.
    ///
    /// Realms report a missing account as `Ok(None)`; this variant is raised
    /// only where a caller demanded an account, e.g. single-realm aggregation.
    #[error("no account found for '{principal}'")]
    UnknownAccount { principal: String },

    /// The realm does not accept tokens of this shape.
    #[error("realm '{realm}' does not support '{kind}' tokens")]
    UnsupportedToken { realm: String, kind: String },

    /// A multi-realm authentication attempt failed without a more specific cause.
    #[error("authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    /// A `check*` authorization call was denied.
    #[error("unauthorized: {reason}")]
    Unauthorized { reason: String },

    /// A permission string could not be resolved.
    #[error("invalid permission '{permission}': {reason}")]
    InvalidPermission { permission: String, reason: String },

    /// A required collaborator is missing or a configuration value is invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// Two realms were configured under the same name.
    #[error("configuration error: duplicate realm name '{name}'")]
    DuplicateRealm { name: String },

    /// An account store, cache or other backend collaborator failed.
    ///
    /// `AccountStore` and `Cache` implementations raise this for their own
    /// I/O or connection failures; realms pass it through unchanged.
    #[error("backend failure in realm '{realm}': {reason}")]
    Backend { realm: String, reason: String },
}

impl RealmError {
    /// Return true for failures of an authentication attempt.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            Self::IncorrectCredentials { .. }
                | Self::ExpiredCredentials { .. }
                | Self::LockedAccount { .. }
                | Self::UnknownAccount { .. }
                | Self::UnsupportedToken { .. }
                | Self::AuthenticationFailed { .. }
        )
    }

    /// Return true for an authorization denial.
    pub fn is_authorization_failure(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// Return true for configuration mistakes.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::ConfigError { .. } | Self::DuplicateRealm { .. })
    }
}

/// Convenience alias used throughout the Castellan crates.
pub type RealmResult<T> = Result<T, RealmError>;
