//! Salted, iterated SHA-256 credential matching.
//!
//! The stored credential is the lowercase hex encoding of
//!
//!   h1 = SHA-256(salt ‖ password), hN = SHA-256(hN-1)
//!
//! where the salt is the submitted username when principal salting is on
//! and empty otherwise. A stored value that is not valid hex never matches.

use sha2::{Digest, Sha256};
use tracing::{trace, warn};

use castellan_contracts::{
    error::{RealmError, RealmResult},
    record::AuthenticationRecord,
    token::AuthenticationToken,
};
use castellan_core::traits::CredentialsMatcher;

use crate::matcher::constant_time_eq;

/// Hash `password` the way `Sha256CredentialsMatcher` expects it stored.
///
/// Returns the lowercase hex digest. `iterations` below 1 is treated as 1.
pub fn sha256_hex(password: &[u8], salt: Option<&[u8]>, iterations: u32) -> String {
    hex::encode(digest(password, salt, iterations))
}

fn digest(password: &[u8], salt: Option<&[u8]>, iterations: u32) -> Vec<u8> {
    let mut hasher = Sha256::new();
    if let Some(salt) = salt {
        hasher.update(salt);
    }
    hasher.update(password);
    let mut hashed = hasher.finalize().to_vec();
    for _ in 1..iterations.max(1) {
        hashed = Sha256::digest(&hashed).to_vec();
    }
    hashed
}

/// Compares the SHA-256 of the submitted credential with a stored hex digest.
#[derive(Debug, Clone)]
pub struct Sha256CredentialsMatcher {
    salt_with_principal: bool,
    iterations: u32,
}

impl Sha256CredentialsMatcher {
    /// Unsalted, one iteration.
    pub fn new() -> Self {
        Self {
            salt_with_principal: false,
            iterations: 1,
        }
    }

    /// Use the submitted principal (the username) as the salt.
    pub fn with_principal_salt(mut self, enabled: bool) -> Self {
        self.salt_with_principal = enabled;
        self
    }

    /// Set the number of hash iterations.
    ///
    /// # Errors
    ///
    /// `RealmError::ConfigError` when `iterations` is zero.
    pub fn with_iterations(mut self, iterations: u32) -> RealmResult<Self> {
        if iterations == 0 {
            return Err(RealmError::ConfigError {
                reason: "hash iterations must be at least 1".to_string(),
            });
        }
        self.iterations = iterations;
        Ok(self)
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn is_salted_with_principal(&self) -> bool {
        self.salt_with_principal
    }

    /// Hash a submitted credential with this matcher's settings.
    pub fn hash_submitted(&self, token: &AuthenticationToken) -> Vec<u8> {
        let salt = self
            .salt_with_principal
            .then(|| token.principal().to_string().into_bytes());
        digest(token.credentials(), salt.as_deref(), self.iterations)
    }
}

impl Default for Sha256CredentialsMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialsMatcher for Sha256CredentialsMatcher {
    fn matches(&self, token: &AuthenticationToken, record: &AuthenticationRecord) -> bool {
        let submitted = self.hash_submitted(token);
        record.credentials().iter().any(|stored| {
            let text = String::from_utf8_lossy(stored.as_bytes());
            match hex::decode(text.trim()) {
                Ok(expected) => {
                    let matched = constant_time_eq(&submitted, &expected);
                    trace!(principal = %token.principal(), matched, "sha-256 credentials comparison");
                    matched
                }
                Err(e) => {
                    warn!(
                        principal = %token.principal(),
                        error = %e,
                        "stored credential is not a hex digest"
                    );
                    false
                }
            }
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
