//! Credential storage shared between the secret watch and the session layer.
//!
//! The watch is the only writer. Readers get a copy of the whole pair, so a
//! username from one secret revision is never combined with a password from
//! another.

use k8s_openapi::api::core::v1::Secret;
use std::sync::{PoisonError, RwLock};

/// Secret key holding the username
pub const USERNAME_KEY: &str = "username";
/// Secret key holding the password
pub const PASSWORD_KEY: &str = "password";

/// A username/password pair
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Reads the pair from a secret's `data`. Returns `None` if either key is missing.
    pub fn from_secret(secret: &Secret) -> Option<Self> {
        let data = secret.data.as_ref()?;
        let username = data.get(USERNAME_KEY)?;
        let password = data.get(PASSWORD_KEY)?;
        Some(Self {
            username: String::from_utf8_lossy(&username.0).into_owned(),
            password: String::from_utf8_lossy(&password.0).into_owned(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.username.is_empty() && self.password.is_empty()
    }
}

/// Read-only access to the current credentials.
///
/// Injected into the session layer so it never depends on how credentials are
/// obtained.
pub trait CredentialProvider: Send + Sync {
    fn credentials(&self) -> Credentials;
}

/// Credentials held in memory, replaced as a whole on every update
#[derive(Debug, Default)]
pub struct CredentialStore {
    current: RwLock<Credentials>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&self, credentials: Credentials) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = credentials;
    }

    pub fn clear(&self) {
        self.replace(Credentials::default());
    }
}

impl CredentialProvider for CredentialStore {
    fn credentials(&self) -> Credentials {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}
