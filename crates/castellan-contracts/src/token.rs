//! Authentication tokens submitted by callers.
//!
//! A token carries the claimed principal, the credential material that proves
//! it, and optional context (origin host, "remember me"). Credential memory is
//! overwritten with zeros when the token is cleared or dropped.

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::principal::Principal;

/// The shape of an `AuthenticationToken`.
///
/// Realms declare which shapes they accept; `Realm::supports` compares
/// against this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenKind {
    UsernamePassword,
    Bearer,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UsernamePassword => f.write_str("username-password"),
            Self::Bearer => f.write_str("bearer"),
        }
    }
}

/// A username and password pair.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct UsernamePasswordToken {
    username: String,
    password: Vec<u8>,
    remember_me: bool,
    host: Option<String>,
}

impl UsernamePasswordToken {
    pub fn new(username: impl Into<String>, password: impl AsRef<[u8]>) -> Self {
        Self {
            username: username.into(),
            password: password.as_ref().to_vec(),
            remember_me: false,
            host: None,
        }
    }

    /// Set the "remember me" flag.
    pub fn with_remember_me(mut self, remember_me: bool) -> Self {
        self.remember_me = remember_me;
        self
    }

    /// Record the host the attempt originated from.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &[u8] {
        &self.password
    }

    pub fn is_remember_me(&self) -> bool {
        self.remember_me
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Overwrite the password with zeros and reset every other field.
    pub fn clear(&mut self) {
        self.zeroize();
    }
}

impl fmt::Debug for UsernamePasswordToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsernamePasswordToken")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("remember_me", &self.remember_me)
            .field("host", &self.host)
            .finish()
    }
}

/// An opaque bearer token (API key, session token, …).
///
/// The token string is both the principal and the credential.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct BearerToken {
    token: String,
    host: Option<String>,
}

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            host: None,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn clear(&mut self) {
        self.zeroize();
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerToken")
            .field("token", &"<redacted>")
            .field("host", &self.host)
            .finish()
    }
}

/// A credential submission, in one of the supported shapes.
#[derive(Debug, Clone)]
pub enum AuthenticationToken {
    UsernamePassword(UsernamePasswordToken),
    Bearer(BearerToken),
}

impl AuthenticationToken {
    /// Shorthand for a username/password token.
    pub fn username_password(username: impl Into<String>, password: impl AsRef<[u8]>) -> Self {
        Self::UsernamePassword(UsernamePasswordToken::new(username, password))
    }

    /// Shorthand for a bearer token.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer(BearerToken::new(token))
    }

    pub fn kind(&self) -> TokenKind {
        match self {
            Self::UsernamePassword(_) => TokenKind::UsernamePassword,
            Self::Bearer(_) => TokenKind::Bearer,
        }
    }

    /// The identity this token claims.
    pub fn principal(&self) -> Principal {
        match self {
            Self::UsernamePassword(t) => Principal::Username(t.username.clone()),
            Self::Bearer(t) => Principal::attribute("bearer", t.token.clone()),
        }
    }

    /// The submitted credential bytes.
    pub fn credentials(&self) -> &[u8] {
        match self {
            Self::UsernamePassword(t) => t.password(),
            Self::Bearer(t) => t.token.as_bytes(),
        }
    }

    pub fn host(&self) -> Option<&str> {
        match self {
            Self::UsernamePassword(t) => t.host(),
            Self::Bearer(t) => t.host(),
        }
    }

    pub fn is_remember_me(&self) -> bool {
        match self {
            Self::UsernamePassword(t) => t.is_remember_me(),
            Self::Bearer(_) => false,
        }
    }

    /// Scrub credential material. Call once the token is no longer needed.
    pub fn clear(&mut self) {
        match self {
            Self::UsernamePassword(t) => t.clear(),
            Self::Bearer(t) => t.clear(),
        }
    }
}

impl From<UsernamePasswordToken> for AuthenticationToken {
    fn from(token: UsernamePasswordToken) -> Self {
        Self::UsernamePassword(token)
    }
}

impl From<BearerToken> for AuthenticationToken {
    fn from(token: BearerToken) -> Self {
        Self::Bearer(token)
    }
}
