//! `RealmAggregator`: several realms behind one authentication and
//! authorization surface.
//!
//! With a single realm, authentication is direct: an unsupported token or an
//! unknown account is an error. With several, the configured
//! [`AuthenticationStrategy`] decides. Authorization is federated: a
//! permission or role is granted if any realm that makes decisions grants it.

use std::{collections::HashSet, fmt, sync::Arc};

use tracing::{debug, info, trace};

use castellan_contracts::{
    error::{RealmError, RealmResult},
    permission::PermissionRequest,
    principal::PrincipalSet,
    record::AuthenticationRecord,
    token::AuthenticationToken,
};
use castellan_core::traits::{Authorizer, Realm};

use crate::strategy::{AtLeastOneSuccessfulStrategy, AuthenticationStrategy};

/// An ordered set of uniquely named realms.
pub struct RealmAggregator {
    realms: Vec<Arc<dyn Realm>>,
    strategy: Arc<dyn AuthenticationStrategy>,
}

impl RealmAggregator {
    /// Aggregate `realms`, in the order given, under the at-least-one-successful strategy.
    ///
    /// # Errors
    ///
    /// `RealmError::ConfigError` for an empty list;
    /// `RealmError::DuplicateRealm` if two realms share a name.
    pub fn new(realms: Vec<Arc<dyn Realm>>) -> RealmResult<Self> {
        if realms.is_empty() {
            return Err(RealmError::ConfigError {
                reason: "no realms configured; at least one realm is required".to_string(),
            });
        }
        let mut seen = HashSet::new();
        for realm in &realms {
            if !seen.insert(realm.name()) {
                return Err(RealmError::DuplicateRealm {
                    name: realm.name().to_string(),
                });
            }
        }
        info!(
            realms = realms.len(),
            names = %realms.iter().map(|r| r.name()).collect::<Vec<_>>().join(", "),
            "realm aggregator configured"
        );
        Ok(Self {
            realms,
            strategy: Arc::new(AtLeastOneSuccessfulStrategy),
        })
    }

    /// Replace the multi-realm authentication strategy.
    pub fn with_strategy(mut self, strategy: impl AuthenticationStrategy + 'static) -> Self {
        self.strategy = Arc::new(strategy);
        self
    }

    pub fn strategy(&self) -> &dyn AuthenticationStrategy {
        self.strategy.as_ref()
    }

    pub fn realms(&self) -> &[Arc<dyn Realm>] {
        &self.realms
    }

    /// The realm called `name`, if configured.
    pub fn realm(&self, name: &str) -> Option<&Arc<dyn Realm>> {
        self.realms.iter().find(|realm| realm.name() == name)
    }

    pub fn realm_names(&self) -> impl Iterator<Item = &str> {
        self.realms.iter().map(|realm| realm.name())
    }

    /// Return true if any configured realm accepts tokens of this shape.
    pub fn supports(&self, token: &AuthenticationToken) -> bool {
        self.realms.iter().any(|realm| realm.supports(token))
    }

    /// Authenticate `token` against the configured realms.
    ///
    /// Unlike a single realm, the aggregate never answers `Ok(None)`: no
    /// account anywhere is an error.
    pub fn authenticate(&self, token: &AuthenticationToken) -> RealmResult<AuthenticationRecord> {
        let record = match self.realms.as_slice() {
            [realm] => self.authenticate_single(realm.as_ref(), token)?,
            realms => self.authenticate_multi(realms, token)?,
        };
        debug!(principals = %record.principals(), "aggregate authentication succeeded");
        Ok(record)
    }

    fn authenticate_single(&self, realm: &dyn Realm, token: &AuthenticationToken) -> RealmResult<AuthenticationRecord> {
        if !realm.supports(token) {
            return Err(RealmError::UnsupportedToken {
                realm: realm.name().to_string(),
                kind: token.kind().to_string(),
            });
        }
        realm.authenticate(token)?.ok_or_else(|| {
            debug!(realm = %realm.name(), principal = %token.principal(), "no account for token");
            RealmError::UnknownAccount {
                principal: token.principal().to_string(),
            }
        })
    }

    fn authenticate_multi(
        &self,
        realms: &[Arc<dyn Realm>],
        token: &AuthenticationToken,
    ) -> RealmResult<AuthenticationRecord> {
        trace!(realms = realms.len(), strategy = ?self.strategy, "multi-realm authentication");
        let mut aggregate = self.strategy.before_all_attempts(realms, token)?;
        let mut failures = Vec::new();

        for realm in realms {
            aggregate = self.strategy.before_attempt(realm.as_ref(), token, aggregate)?;
            if !realm.supports(token) {
                debug!(realm = %realm.name(), kind = %token.kind(), "realm does not support token, skipping");
                continue;
            }

            let (single, error) = match realm.authenticate(token) {
                Ok(record) => (record, None),
                Err(e) => {
                    debug!(realm = %realm.name(), error = %e, "realm failed during multi-realm attempt");
                    (None, Some(e))
                }
            };
            aggregate = self
                .strategy
                .after_attempt(realm.as_ref(), token, single.as_ref(), aggregate, error.as_ref())?;
            failures.extend(error);

            if self.strategy.is_complete(&aggregate) {
                trace!(realm = %realm.name(), "strategy complete, skipping remaining realms");
                break;
            }
        }

        self.strategy.after_all_attempts(token, aggregate, &failures)
    }

    /// Tell every realm that `principals` is logging out.
    ///
    /// Every realm is visited even if one fails; the first failure is returned.
    pub fn on_logout(&self, principals: &PrincipalSet) -> RealmResult<()> {
        let mut first_error = None;
        for realm in &self.realms {
            if let Err(e) = realm.on_logout(principals) {
                debug!(realm = %realm.name(), error = %e, "logout hook failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn authorizers(&self) -> impl Iterator<Item = &dyn Authorizer> {
        self.realms.iter().filter_map(|realm| realm.as_authorizer())
    }
}

impl fmt::Debug for RealmAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealmAggregator")
            .field("realms", &self.realm_names().collect::<Vec<_>>())
            .field("strategy", &self.strategy)
            .finish()
    }
}

/// OR across every realm that makes decisions; the first grant wins.
///
/// Batch and `check_*` forms come from the trait defaults, each built on
/// the aggregate `is_permitted` / `has_role`.
impl Authorizer for RealmAggregator {
    fn is_permitted(&self, principals: &PrincipalSet, permission: &PermissionRequest) -> RealmResult<bool> {
        for authorizer in self.authorizers() {
            if authorizer.is_permitted(principals, permission)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn has_role(&self, principals: &PrincipalSet, role: &str) -> RealmResult<bool> {
        for authorizer in self.authorizers() {
            if authorizer.has_role(principals, role)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
