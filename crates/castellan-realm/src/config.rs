//! TOML realm definitions.
//!
//! A `RealmsConfig` holds one `RealmDefinition` per `[[realms]]` table. Each
//! definition becomes an `InMemoryRealm` holding the declared roles and users.
//!
//! ```toml
//! [[realms]]
//! name = "corporate"
//! cache_authorization = true
//!
//! [realms.roles]
//! admin = ["user:*", "printer:print"]
//!
//! [[realms.users]]
//! username = "alice"
//! password = "wonderland"
//! roles = ["admin"]
//! permissions = ["report:read"]
//! credentials_expire_at = "2030-01-01T00:00:00Z"
//! ```

use std::{collections::BTreeMap, path::Path, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use castellan_contracts::{
    account::{Account, Role},
    error::{RealmError, RealmResult},
};
use castellan_core::traits::{CredentialsMatcher, PermissionResolver, RealmCacheManager};
use castellan_credential::{Sha256CredentialsMatcher, SimpleCredentialsMatcher};
use castellan_permission::WildcardPermissionResolver;

use crate::memory::InMemoryRealm;

fn default_true() -> bool {
    true
}

/// One user declared in a realm definition.
///
/// Exactly one of `password` and `password_sha256` must be present. The
/// hashed form is the hex SHA-256 of the username followed by the password.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDefinition {
    pub username: String,

    /// Plaintext password, compared byte for byte.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Hex SHA-256 digest, salted with the username, one iteration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_sha256: Option<String>,

    #[serde(default)]
    pub roles: Vec<String>,

    /// Permission strings granted directly to the user.
    #[serde(default)]
    pub permissions: Vec<String>,

    #[serde(default)]
    pub locked: bool,

    /// RFC 3339 instant after which the password is refused. Quote it in TOML.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_expire_at: Option<DateTime<Utc>>,
}

/// How a realm definition stores its users' passwords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PasswordForm {
    Plain,
    Sha256,
}

/// A single realm as declared in TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealmDefinition {
    pub name: String,

    /// Cache authorization records (default: true).
    #[serde(default = "default_true")]
    pub cache_authorization: bool,

    /// Cache authentication records (default: false).
    #[serde(default)]
    pub cache_authentication: bool,

    /// Role name → permission strings.
    #[serde(default)]
    pub roles: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub users: Vec<UserDefinition>,
}

impl RealmDefinition {
    /// Parse a single realm definition from a TOML document.
    ///
    /// Returns `RealmError::ConfigError` if the TOML is malformed or does not
    /// match the expected schema.
    pub fn from_toml_str(s: &str) -> RealmResult<Self> {
        toml::from_str(s).map_err(|e| RealmError::ConfigError {
            reason: format!("failed to parse realm TOML: {}", e),
        })
    }

    /// Read and parse a single realm definition.
    pub fn from_file(path: &Path) -> RealmResult<Self> {
        Self::from_toml_str(&read_config(path)?)
    }

    /// Build the in-memory realm this definition describes.
    ///
    /// # Errors
    ///
    /// `RealmError::ConfigError` for a blank name, a user without a password,
    /// or a realm mixing plaintext and hashed passwords;
    /// `RealmError::InvalidPermission` for a malformed permission string.
    pub fn build(&self, cache_manager: Option<Arc<dyn RealmCacheManager>>) -> RealmResult<InMemoryRealm> {
        let form = self.password_form()?;
        let resolver = Arc::new(WildcardPermissionResolver::new());

        let matcher: Arc<dyn CredentialsMatcher> = match form {
            PasswordForm::Plain => Arc::new(SimpleCredentialsMatcher::new()),
            PasswordForm::Sha256 => Arc::new(Sha256CredentialsMatcher::new().with_principal_salt(true)),
        };

        let mut builder = InMemoryRealm::builder(self.name.clone())
            .credentials_matcher(matcher)
            .permission_resolver(resolver.clone())
            .authentication_caching(self.cache_authentication)
            .authorization_caching(self.cache_authorization);
        if let Some(manager) = cache_manager {
            builder = builder.cache_manager(manager);
        }

        for (name, permissions) in &self.roles {
            let permissions = permissions
                .iter()
                .map(|p| resolver.resolve(p))
                .collect::<RealmResult<Vec<_>>>()?;
            builder = builder.role(Role::new(name.clone()).with_permissions(permissions));
        }

        for user in &self.users {
            let credential = match form {
                PasswordForm::Plain => user.password.clone(),
                PasswordForm::Sha256 => user.password_sha256.clone(),
            }
            .unwrap_or_default();
            let mut account = Account::new(user.username.clone(), credential, self.name.clone())
                .with_roles(user.roles.iter().cloned())
                .with_string_permissions(user.permissions.iter().cloned())
                .with_locked(user.locked);
            if let Some(at) = user.credentials_expire_at {
                account = account.with_credentials_expire_at(at);
            }
            builder = builder.account(account);
        }

        debug!(
            realm = %self.name,
            roles = self.roles.len(),
            users = self.users.len(),
            "building realm from definition"
        );
        builder.build()
    }

    fn password_form(&self) -> RealmResult<PasswordForm> {
        let mut form = None;
        for user in &self.users {
            let this = match (&user.password, &user.password_sha256) {
                (Some(_), None) => PasswordForm::Plain,
                (None, Some(_)) => PasswordForm::Sha256,
                (Some(_), Some(_)) => {
                    return Err(RealmError::ConfigError {
                        reason: format!(
                            "user '{}' in realm '{}' declares both password and password_sha256",
                            user.username, self.name
                        ),
                    })
                }
                (None, None) => {
                    return Err(RealmError::ConfigError {
                        reason: format!("user '{}' in realm '{}' has no password", user.username, self.name),
                    })
                }
            };
            match form {
                None => form = Some(this),
                Some(seen) if seen != this => {
                    return Err(RealmError::ConfigError {
                        reason: format!(
                            "realm '{}' mixes plaintext and sha-256 passwords; a realm has one credentials matcher",
                            self.name
                        ),
                    })
                }
                Some(_) => {}
            }
        }
        Ok(form.unwrap_or(PasswordForm::Plain))
    }
}

/// The top-level structure of a realms file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RealmsConfig {
    #[serde(default)]
    pub realms: Vec<RealmDefinition>,
}

impl RealmsConfig {
    /// Parse `s` as a realms TOML document.
    ///
    /// Returns `RealmError::ConfigError` if the TOML is malformed or does not
    /// match the expected schema.
    pub fn from_toml_str(s: &str) -> RealmResult<Self> {
        toml::from_str(s).map_err(|e| RealmError::ConfigError {
            reason: format!("failed to parse realm TOML: {}", e),
        })
    }

    /// Read the file at `path` and parse it as a realms document.
    pub fn from_file(path: &Path) -> RealmResult<Self> {
        Self::from_toml_str(&read_config(path)?)
    }

    /// Build one `InMemoryRealm` per definition, in declaration order.
    ///
    /// Every realm shares `cache_manager`, if one is given.
    pub fn into_realms(self, cache_manager: Option<Arc<dyn RealmCacheManager>>) -> RealmResult<Vec<InMemoryRealm>> {
        self.realms
            .iter()
            .map(|definition| definition.build(cache_manager.clone()))
            .collect()
    }
}

fn read_config(path: &Path) -> RealmResult<String> {
    std::fs::read_to_string(path).map_err(|e| RealmError::ConfigError {
        reason: format!("failed to read realm file '{}': {}", path.display(), e),
    })
}
