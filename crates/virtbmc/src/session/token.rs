//! Session records and the token store.
//!
//! A token is the lowercase hex SHA-256 of the session record's JSON form
//! (`{"ID":..,"Username":..}`). It is derived, not random: identical records
//! map to the same token, and anyone who can guess a session id and username
//! can compute it.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// An authenticated session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Username")]
    pub username: String,
}

impl SessionInfo {
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
        }
    }
}

/// Derives the token for a session record
pub fn derive_token(info: &SessionInfo) -> String {
    let canonical = serde_json::json!({ "ID": info.id, "Username": info.username }).to_string();
    format!("{:x}", Sha256::digest(canonical.as_bytes()))
}

/// Sessions keyed by token
#[derive(Debug, Default)]
pub struct TokenStore {
    sessions: RwLock<HashMap<String, SessionInfo>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the session and returns its token. Re-adding an identical record
    /// returns the same token and overwrites the stored copy.
    pub fn add(&self, info: SessionInfo) -> String {
        let token = derive_token(&info);
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.clone(), info);
        token
    }

    pub fn get(&self, token: &str) -> Option<SessionInfo> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(token)
            .cloned()
    }

    /// Finds a session by id (linear scan). Returns the token with the record.
    pub fn get_by_session_id(&self, id: &str) -> Option<(String, SessionInfo)> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(_, info)| info.id == id)
            .map(|(token, info)| (token.clone(), info.clone()))
    }

    /// Removes a session. Unknown tokens are ignored.
    pub fn remove(&self, token: &str) {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(token);
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
