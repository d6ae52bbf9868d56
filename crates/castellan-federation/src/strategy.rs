//! Multi-realm authentication strategies.
//!
//! The aggregator drives a strategy through one attempt:
//!
//!   before_all_attempts ──► for each realm { before_attempt ──► authenticate ──► after_attempt } ──► after_all_attempts
//!
//! The aggregate record is threaded through every hook by value, so a
//! strategy decides what each realm's result contributes. Realm errors are
//! handed to `after_attempt` and, collected, to `after_all_attempts`; what
//! becomes of them is the strategy's call.

use std::{fmt, sync::Arc};

use tracing::{debug, trace};

use castellan_contracts::{
    error::{RealmError, RealmResult},
    record::AuthenticationRecord,
    token::AuthenticationToken,
};
use castellan_core::traits::Realm;

/// Decides how per-realm outcomes combine into one authentication result.
pub trait AuthenticationStrategy: Send + Sync + fmt::Debug {
    /// The starting aggregate. Defaults to an empty record.
    fn before_all_attempts(
        &self,
        _realms: &[Arc<dyn Realm>],
        _token: &AuthenticationToken,
    ) -> RealmResult<AuthenticationRecord> {
        Ok(AuthenticationRecord::default())
    }

    /// Called for every configured realm, including ones that will be
    /// skipped because they do not support the token.
    fn before_attempt(
        &self,
        _realm: &dyn Realm,
        _token: &AuthenticationToken,
        aggregate: AuthenticationRecord,
    ) -> RealmResult<AuthenticationRecord> {
        Ok(aggregate)
    }

    /// Fold one supporting realm's outcome into the aggregate.
    ///
    /// `single` is the realm's record (`None` for an unknown account);
    /// `error` is what the realm raised, if anything. The default merges a
    /// record and leaves errors for `after_all_attempts`.
    fn after_attempt(
        &self,
        _realm: &dyn Realm,
        _token: &AuthenticationToken,
        single: Option<&AuthenticationRecord>,
        mut aggregate: AuthenticationRecord,
        _error: Option<&RealmError>,
    ) -> RealmResult<AuthenticationRecord> {
        if let Some(record) = single {
            aggregate.merge(record);
        }
        Ok(aggregate)
    }

    /// Produce the final result from the aggregate and the collected errors.
    fn after_all_attempts(
        &self,
        token: &AuthenticationToken,
        aggregate: AuthenticationRecord,
        failures: &[RealmError],
    ) -> RealmResult<AuthenticationRecord>;

    /// Return true to stop visiting further realms.
    fn is_complete(&self, _aggregate: &AuthenticationRecord) -> bool {
        false
    }
}

/// No realm produced a record: report the first realm error, or a generic failure.
fn nothing_authenticated(token: &AuthenticationToken, failures: &[RealmError]) -> RealmError {
    match failures.first() {
        Some(first) => first.clone(),
        None => RealmError::AuthenticationFailed {
            reason: format!(
                "token for [{}] could not be authenticated by any configured realm",
                token.principal()
            ),
        },
    }
}

// ── AtLeastOneSuccessful ──────────────────────────────────────────────────────

/// Succeeds if any realm authenticates the token; merges every success.
///
/// The default strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct AtLeastOneSuccessfulStrategy;

impl AuthenticationStrategy for AtLeastOneSuccessfulStrategy {
    fn after_all_attempts(
        &self,
        token: &AuthenticationToken,
        aggregate: AuthenticationRecord,
        failures: &[RealmError],
    ) -> RealmResult<AuthenticationRecord> {
        if aggregate.is_empty() {
            debug!(principal = %token.principal(), failures = failures.len(), "no realm authenticated the token");
            return Err(nothing_authenticated(token, failures));
        }
        Ok(aggregate)
    }
}

// ── FirstSuccessful ───────────────────────────────────────────────────────────

/// Uses only the first realm that authenticates the token.
///
/// Later realms are still consulted unless `stop_after_first_success` is
/// set, but their records are not merged.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstSuccessfulStrategy {
    stop_after_first_success: bool,
}

impl FirstSuccessfulStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop_after_first_success(mut self, stop: bool) -> Self {
        self.stop_after_first_success = stop;
        self
    }
}

impl AuthenticationStrategy for FirstSuccessfulStrategy {
    fn after_attempt(
        &self,
        realm: &dyn Realm,
        _token: &AuthenticationToken,
        single: Option<&AuthenticationRecord>,
        mut aggregate: AuthenticationRecord,
        _error: Option<&RealmError>,
    ) -> RealmResult<AuthenticationRecord> {
        match single {
            Some(record) if aggregate.is_empty() => aggregate.merge(record),
            Some(_) => trace!(realm = %realm.name(), "ignoring record after first success"),
            None => {}
        }
        Ok(aggregate)
    }

    fn after_all_attempts(
        &self,
        token: &AuthenticationToken,
        aggregate: AuthenticationRecord,
        failures: &[RealmError],
    ) -> RealmResult<AuthenticationRecord> {
        if aggregate.is_empty() {
            return Err(nothing_authenticated(token, failures));
        }
        Ok(aggregate)
    }

    fn is_complete(&self, aggregate: &AuthenticationRecord) -> bool {
        self.stop_after_first_success && !aggregate.is_empty()
    }
}

// ── AllSuccessful ─────────────────────────────────────────────────────────────

/// Every configured realm must support and authenticate the token.
///
/// The first unsupported realm, unknown account or realm error ends the
/// attempt with that failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllSuccessfulStrategy;

impl AuthenticationStrategy for AllSuccessfulStrategy {
    fn before_attempt(
        &self,
        realm: &dyn Realm,
        token: &AuthenticationToken,
        aggregate: AuthenticationRecord,
    ) -> RealmResult<AuthenticationRecord> {
        if !realm.supports(token) {
            return Err(RealmError::UnsupportedToken {
                realm: realm.name().to_string(),
                kind: token.kind().to_string(),
            });
        }
        Ok(aggregate)
    }

    fn after_attempt(
        &self,
        realm: &dyn Realm,
        token: &AuthenticationToken,
        single: Option<&AuthenticationRecord>,
        mut aggregate: AuthenticationRecord,
        error: Option<&RealmError>,
    ) -> RealmResult<AuthenticationRecord> {
        if let Some(error) = error {
            return Err(error.clone());
        }
        let Some(record) = single else {
            debug!(realm = %realm.name(), principal = %token.principal(), "realm has no account for token");
            return Err(RealmError::UnknownAccount {
                principal: token.principal().to_string(),
            });
        };
        aggregate.merge(record);
        Ok(aggregate)
    }

    fn after_all_attempts(
        &self,
        token: &AuthenticationToken,
        aggregate: AuthenticationRecord,
        failures: &[RealmError],
    ) -> RealmResult<AuthenticationRecord> {
        if aggregate.is_empty() {
            return Err(nothing_authenticated(token, failures));
        }
        Ok(aggregate)
    }
}
