//! Castellan realm engine demo CLI.
//!
//! Loads realms from a TOML file, aggregates them, and answers
//! authentication and authorization requests as JSON.
//!
//! Usage:
//!   cargo run -p castellan-demo -- authenticate --config demo/config/realms.toml --username alice --password wonderland
//!   cargo run -p castellan-demo -- check --config demo/config/realms.toml --username alice --permission user:delete --role admin
//!   cargo run -p castellan-demo -- scenarios

mod scenarios;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use castellan_cache::MemoryCacheManager;
use castellan_contracts::{
    error::RealmError,
    permission::PermissionRequest,
    principal::PrincipalSet,
    token::AuthenticationToken,
};
use castellan_core::traits::{Authorizer, Realm, RealmCacheManager};
use castellan_federation::{
    AllSuccessfulStrategy, AtLeastOneSuccessfulStrategy, FirstSuccessfulStrategy, RealmAggregator,
};
use castellan_realm::RealmsConfig;

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum DemoError {
    #[error(transparent)]
    Realm(#[from] RealmError),

    #[error("failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type DemoResult<T> = Result<T, DemoError>;

// ── CLI definition ────────────────────────────────────────────────────────────

/// Castellan: realm-based authentication and authorization.
#[derive(Parser)]
#[command(
    name = "castellan-demo",
    about = "Castellan realm engine demo",
    long_about = "Loads realms from TOML and runs authentication, permission and role\n\
                  checks against them. Results are printed as JSON."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Authenticate a username and password against every configured realm.
    Authenticate {
        /// Realms TOML file.
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        /// How results from several realms combine.
        #[arg(long, value_enum, default_value_t = StrategyArg::AtLeastOne)]
        strategy: StrategyArg,
    },
    /// Evaluate permissions and roles for a user across every configured realm.
    Check {
        /// Realms TOML file.
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        username: String,
        /// Permission to test, e.g. `printer:print:lp7200`. Repeatable.
        #[arg(long = "permission")]
        permissions: Vec<String>,
        /// Role to test. Repeatable.
        #[arg(long = "role")]
        roles: Vec<String>,
    },
    /// Run the built-in scenarios against the bundled realms.
    Scenarios,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    AtLeastOne,
    First,
    All,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Authenticate {
            config,
            username,
            password,
            strategy,
        } => run_authenticate(&config, &username, &password, strategy),
        Command::Check {
            config,
            username,
            permissions,
            roles,
        } => run_check(&config, &username, &permissions, &roles),
        Command::Scenarios => scenarios::run_all(),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("castellan-demo error: {}", e);
            std::process::exit(1);
        }
    }
}

// ── Wiring ────────────────────────────────────────────────────────────────────

/// Build one aggregator over every realm declared in `config`.
fn load_aggregator(config: &Path, strategy: StrategyArg) -> DemoResult<RealmAggregator> {
    let caches: Arc<dyn RealmCacheManager> = Arc::new(MemoryCacheManager::new());
    let realms: Vec<Arc<dyn Realm>> = RealmsConfig::from_file(config)?
        .into_realms(Some(caches))?
        .into_iter()
        .map(|realm| Arc::new(realm) as Arc<dyn Realm>)
        .collect();
    info!(config = %config.display(), realms = realms.len(), "realms loaded");

    let aggregator = RealmAggregator::new(realms)?;
    Ok(match strategy {
        StrategyArg::AtLeastOne => aggregator.with_strategy(AtLeastOneSuccessfulStrategy),
        StrategyArg::First => aggregator.with_strategy(FirstSuccessfulStrategy::new()),
        StrategyArg::All => aggregator.with_strategy(AllSuccessfulStrategy),
    })
}

fn print_json<T: Serialize>(value: &T) -> DemoResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ── authenticate ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct AuthenticationReport<'a> {
    username: &'a str,
    authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    principals: Option<PrincipalSet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn run_authenticate(config: &Path, username: &str, password: &str, strategy: StrategyArg) -> DemoResult<bool> {
    let aggregator = load_aggregator(config, strategy)?;
    let mut token = AuthenticationToken::username_password(username, password);
    let outcome = aggregator.authenticate(&token);
    token.clear();

    let report = match outcome {
        Ok(record) => AuthenticationReport {
            username,
            authenticated: true,
            principals: Some(record.principals().clone()),
            error: None,
        },
        Err(e) => AuthenticationReport {
            username,
            authenticated: false,
            principals: None,
            error: Some(e.to_string()),
        },
    };
    print_json(&report)?;
    Ok(report.authenticated)
}

// ── check ─────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct Decision {
    subject: String,
    granted: bool,
}

#[derive(Serialize)]
struct CheckReport<'a> {
    username: &'a str,
    permissions: Vec<Decision>,
    roles: Vec<Decision>,
}

fn run_check(config: &Path, username: &str, permissions: &[String], roles: &[String]) -> DemoResult<bool> {
    let aggregator = load_aggregator(config, StrategyArg::AtLeastOne)?;
    let home = aggregator.realm_names().next().unwrap_or_default().to_string();
    let principals = PrincipalSet::of_principal(username, home);

    let permissions = permissions
        .iter()
        .map(|p| {
            Ok(Decision {
                subject: p.clone(),
                granted: aggregator.is_permitted(&principals, &PermissionRequest::from(p.as_str()))?,
            })
        })
        .collect::<Result<Vec<_>, RealmError>>()?;
    let roles = roles
        .iter()
        .map(|r| {
            Ok(Decision {
                subject: r.clone(),
                granted: aggregator.has_role(&principals, r)?,
            })
        })
        .collect::<Result<Vec<_>, RealmError>>()?;

    print_json(&CheckReport {
        username,
        permissions,
        roles,
    })?;
    Ok(true)
}
