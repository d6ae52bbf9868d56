//! Plain credential matchers.
//!
//! `SimpleCredentialsMatcher` compares the submitted bytes with each stored
//! credential directly. `AllowAllCredentialsMatcher` accepts anything and is
//! meant for realms whose backend has already proven the identity (e.g. a
//! bearer token validated upstream).

use tracing::trace;

use castellan_contracts::{record::AuthenticationRecord, token::AuthenticationToken};
use castellan_core::traits::CredentialsMatcher;

/// Compare two byte strings in time independent of where they differ.
///
/// Length is not hidden; only content.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Byte equality between the submitted credential and any stored credential.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleCredentialsMatcher;

impl SimpleCredentialsMatcher {
    pub fn new() -> Self {
        Self
    }
}

impl CredentialsMatcher for SimpleCredentialsMatcher {
    fn matches(&self, token: &AuthenticationToken, record: &AuthenticationRecord) -> bool {
        let submitted = token.credentials();
        let matched = record
            .credentials()
            .iter()
            .any(|stored| constant_time_eq(submitted, stored.as_bytes()));
        trace!(principal = %token.principal(), matched, "simple credentials comparison");
        matched
    }
}

/// Accepts every submission.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllCredentialsMatcher;

impl CredentialsMatcher for AllowAllCredentialsMatcher {
    fn matches(&self, _token: &AuthenticationToken, _record: &AuthenticationRecord) -> bool {
        true
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use castellan_contracts::{
        principal::PrincipalSet,
        record::AuthenticationRecord,
        token::AuthenticationToken,
    };
    use castellan_core::traits::CredentialsMatcher;

    use super::{constant_time_eq, AllowAllCredentialsMatcher, SimpleCredentialsMatcher};

    fn record(credentials: &[&str]) -> AuthenticationRecord {
        AuthenticationRecord::with_credentials(
            PrincipalSet::of_principal("alice", "test"),
            credentials.iter().copied(),
        )
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secreT"));
        assert!(!constant_time_eq(b"secret", b"secrets"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn test_simple_matcher_accepts_exact_credential() {
        let matcher = SimpleCredentialsMatcher::new();
        let token = AuthenticationToken::username_password("alice", "wonderland");

        assert!(matcher.matches(&token, &record(&["wonderland"])));
        assert!(!matcher.matches(&token, &record(&["Wonderland"])));
    }

    /// Merged records hold several credentials; any one may match.
    #[test]
    fn test_simple_matcher_checks_every_stored_credential() {
        let matcher = SimpleCredentialsMatcher::new();
        let token = AuthenticationToken::username_password("alice", "second");

        assert!(matcher.matches(&token, &record(&["first", "second"])));
        assert!(!matcher.matches(&token, &record(&[])));
    }

    #[test]
    fn test_bearer_token_compared_by_token_string() {
        let matcher = SimpleCredentialsMatcher::new();
        assert!(matcher.matches(&AuthenticationToken::bearer("tok-1"), &record(&["tok-1"])));
        assert!(!matcher.matches(&AuthenticationToken::bearer("tok-2"), &record(&["tok-1"])));
    }

    #[test]
    fn test_allow_all() {
        let token = AuthenticationToken::username_password("alice", "anything");
        assert!(AllowAllCredentialsMatcher.matches(&token, &record(&["other"])));
    }
}
