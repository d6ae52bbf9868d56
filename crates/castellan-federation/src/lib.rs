//! # castellan-federation
//!
//! Multi-realm authentication and federated authorization.
//!
//! ## Overview
//!
//! [`RealmAggregator`] holds uniquely named realms. Authentication goes
//! straight to the realm when only one is configured and through an
//! [`AuthenticationStrategy`] otherwise:
//!
//! - [`AtLeastOneSuccessfulStrategy`] (default): any success wins, all successes merge
//! - [`FirstSuccessfulStrategy`]: only the first success counts
//! - [`AllSuccessfulStrategy`]: every realm must succeed
//!
//! Authorization is an OR over every realm that exposes an authorizer.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use castellan_federation::{FirstSuccessfulStrategy, RealmAggregator};
//!
//! let aggregator = RealmAggregator::new(vec![corporate, partners])?
//!     .with_strategy(FirstSuccessfulStrategy::new());
//! let record = aggregator.authenticate(&token)?;
//! aggregator.check_permission(record.principals(), &"report:read".into())?;
//! ```

pub mod aggregator;
pub mod strategy;

pub use aggregator::RealmAggregator;
pub use strategy::{
    AllSuccessfulStrategy, AtLeastOneSuccessfulStrategy, AuthenticationStrategy, FirstSuccessfulStrategy,
};

// ── Tests ─────────────────────────────────────────────────────────────────────
