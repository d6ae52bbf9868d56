//! Built-in demo scenarios.
//!
//! Each scenario drives real Castellan components and records what it asked,
//! what it expected and what it observed. The report is printed as JSON and
//! the run fails if any observation differs from its expectation.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use serde::Serialize;
use tracing::info;

use castellan_cache::MemoryCacheManager;
use castellan_contracts::{
    account::Account,
    error::{RealmError, RealmResult},
    permission::PermissionRequest,
    principal::PrincipalSet,
    record::AuthenticationRecord,
    token::AuthenticationToken,
};
use castellan_core::traits::{AccountStore, Authorizer, Realm, RealmCacheManager};
use castellan_federation::RealmAggregator;
use castellan_realm::{AccountStoreRealm, InMemoryRealm, RealmsConfig};

use crate::{print_json, DemoResult};

const BUNDLED_REALMS: &str = include_str!("../config/realms.toml");

#[derive(Debug, Serialize)]
pub struct Step {
    pub action: String,
    pub expected: String,
    pub observed: String,
}

#[derive(Debug, Serialize)]
pub struct ScenarioReport {
    pub name: &'static str,
    pub passed: bool,
    pub steps: Vec<Step>,
}

/// Collects steps for one scenario.
struct Recorder {
    name: &'static str,
    steps: Vec<Step>,
}

impl Recorder {
    fn new(name: &'static str) -> Self {
        Self { name, steps: Vec::new() }
    }

    fn step(&mut self, action: impl Into<String>, expected: impl ToString, observed: impl ToString) {
        self.steps.push(Step {
            action: action.into(),
            expected: expected.to_string(),
            observed: observed.to_string(),
        });
    }

    fn finish(self) -> ScenarioReport {
        let passed = self.steps.iter().all(|s| s.expected == s.observed);
        info!(scenario = self.name, passed, steps = self.steps.len(), "scenario finished");
        ScenarioReport {
            name: self.name,
            passed,
            steps: self.steps,
        }
    }
}

/// Short label for an authentication outcome.
fn outcome(result: &RealmResult<impl Sized>) -> &'static str {
    match result {
        Ok(_) => "authenticated",
        Err(RealmError::IncorrectCredentials { .. }) => "incorrect-credentials",
        Err(RealmError::ExpiredCredentials { .. }) => "expired-credentials",
        Err(RealmError::LockedAccount { .. }) => "locked-account",
        Err(RealmError::UnknownAccount { .. }) => "unknown-account",
        Err(RealmError::UnsupportedToken { .. }) => "unsupported-token",
        Err(RealmError::AuthenticationFailed { .. }) => "authentication-failed",
        Err(_) => "error",
    }
}

fn login(username: &str, password: &str) -> AuthenticationToken {
    AuthenticationToken::username_password(username, password)
}

/// Run every scenario and print the combined report.
pub fn run_all() -> DemoResult<bool> {
    let reports = vec![federated_roles()?, cache_invalidation()?, stale_credentials()?];
    let passed = reports.iter().all(|r| r.passed);
    print_json(&reports)?;
    Ok(passed)
}

// ── 1. Federated roles ────────────────────────────────────────────────────────

/// Two realms from the bundled TOML: grants from either one count.
fn federated_roles() -> DemoResult<ScenarioReport> {
    let mut rec = Recorder::new("federated-roles");

    let caches: Arc<dyn RealmCacheManager> = Arc::new(MemoryCacheManager::new());
    let realms: Vec<Arc<dyn Realm>> = RealmsConfig::from_toml_str(BUNDLED_REALMS)?
        .into_realms(Some(caches))?
        .into_iter()
        .map(|realm| Arc::new(realm) as Arc<dyn Realm>)
        .collect();
    let aggregator = RealmAggregator::new(realms)?;

    for (user, password, expected) in [
        ("alice", "wonderland", "authenticated"),
        ("carol", "cheshire", "authenticated"),
        ("eve", "hunter2", "locked-account"),
        ("mallory", "expired", "expired-credentials"),
        ("alice", "guess", "incorrect-credentials"),
        ("nobody", "x", "authentication-failed"),
    ] {
        let observed = outcome(&aggregator.authenticate(&login(user, password)));
        rec.step(format!("authenticate {user}"), expected, observed);
    }

    let alice = PrincipalSet::of_principal("alice", "corporate");
    let bob = PrincipalSet::of_principal("bob", "corporate");

    rec.step("alice has role admin", true, aggregator.has_role(&alice, "admin")?);
    rec.step("alice has role partner", true, aggregator.has_role(&alice, "partner")?);
    rec.step("alice has role auditor", false, aggregator.has_role(&alice, "auditor")?);
    rec.step(
        "alice is permitted catalog:order",
        true,
        aggregator.is_permitted(&alice, &PermissionRequest::from("catalog:order"))?,
    );
    rec.step(
        "bob is permitted catalog:order",
        false,
        aggregator.is_permitted(&bob, &PermissionRequest::from("catalog:order"))?,
    );
    rec.step(
        "bob is permitted report:read",
        true,
        aggregator.is_permitted(&bob, &PermissionRequest::from("report:read"))?,
    );

    Ok(rec.finish())
}

// ── 2. Cache invalidation ─────────────────────────────────────────────────────

/// Replacing an account drops its cached authorization record; so does logout.
fn cache_invalidation() -> DemoResult<ScenarioReport> {
    let mut rec = Recorder::new("cache-invalidation");

    let caches = Arc::new(MemoryCacheManager::new());
    let realm = InMemoryRealm::builder("workshop")
        .cache_manager(caches.clone())
        .account(Account::new("bob", "builder", "workshop"))
        .build()?;
    let bob = PrincipalSet::of_principal("bob", "workshop");

    rec.step("bob has role foreman", false, realm.has_role(&bob, "foreman")?);
    rec.step("cached records", 1, caches.total_entries());

    realm.add_account(Account::new("bob", "builder", "workshop").with_role("foreman"))?;
    rec.step("cached records after promotion", 0, caches.total_entries());
    rec.step("bob has role foreman after promotion", true, realm.has_role(&bob, "foreman")?);

    realm.on_logout(&bob)?;
    rec.step("cached records after logout", 0, caches.total_entries());

    Ok(rec.finish())
}

// ── 3. Stale credentials ──────────────────────────────────────────────────────

/// An account store that counts how often it is asked.
struct DirectoryStore {
    accounts: HashMap<String, Account>,
    lookups: AtomicUsize,
}

impl AccountStore for DirectoryStore {
    fn lookup(&self, token: &AuthenticationToken) -> RealmResult<Option<Account>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.accounts.get(&token.principal().to_string()).cloned())
    }
}

/// A cached account never lets a wrong password through.
fn stale_credentials() -> DemoResult<ScenarioReport> {
    let mut rec = Recorder::new("stale-credentials");

    let store = Arc::new(DirectoryStore {
        accounts: HashMap::from([("alice".to_string(), Account::new("alice", "wonderland", "directory"))]),
        lookups: AtomicUsize::new(0),
    });
    let realm = AccountStoreRealm::builder("directory", store.clone())
        .cache_manager(Arc::new(MemoryCacheManager::new()))
        .build()?;

    let first: RealmResult<Option<AuthenticationRecord>> = realm.authenticate(&login("alice", "wonderland"));
    rec.step("authenticate alice", "authenticated", outcome(&first));
    rec.step("store lookups", 1, store.lookups.load(Ordering::SeqCst));

    let wrong = realm.authenticate(&login("alice", "guess"));
    rec.step("authenticate alice with a wrong password", "incorrect-credentials", outcome(&wrong));
    rec.step("store lookups", 1, store.lookups.load(Ordering::SeqCst));

    let again = realm.authenticate(&login("alice", "wonderland"));
    rec.step("authenticate alice again", "authenticated", outcome(&again));
    rec.step("store lookups", 1, store.lookups.load(Ordering::SeqCst));

    Ok(rec.finish())
}
