//! # castellan-credential
//!
//! Credentials matchers for Castellan realms.
//!
//! A realm hands every authentication attempt to exactly one
//! [`CredentialsMatcher`](castellan_core::traits::CredentialsMatcher):
//!
//! - [`SimpleCredentialsMatcher`]: constant-time byte equality against any
//!   stored credential (plaintext stores, bearer tokens)
//! - [`Sha256CredentialsMatcher`]: stored hex SHA-256 digest, optionally
//!   salted with the username and iterated
//! - [`AllowAllCredentialsMatcher`]: accepts everything
//!
//! Use [`sha256_hex`] to produce digests in the stored format.

pub mod hashed;
pub mod matcher;

pub use hashed::{sha256_hex, Sha256CredentialsMatcher};
pub use matcher::{constant_time_eq, AllowAllCredentialsMatcher, SimpleCredentialsMatcher};
