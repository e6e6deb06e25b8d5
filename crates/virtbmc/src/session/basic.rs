//! HTTP Basic credential validation.

use crate::credentials::CredentialProvider;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt;
use std::sync::Arc;

/// Fallback username accepted regardless of the synced secret.
///
/// This is a development bypass: any client knowing this pair can
/// authenticate. Deployments that rely on the secret alone should not expose
/// the agent outside the cluster.
pub const FALLBACK_USERNAME: &str = "admin";
/// Fallback password paired with [`FALLBACK_USERNAME`]
pub const FALLBACK_PASSWORD: &str = "password";

/// Constant-time string comparison to avoid leaking password prefixes through timing
fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
    }
    acc == 0
}

/// Checks username/password pairs against the synced credentials and the fallback pair
#[derive(Clone)]
pub struct BasicAuthValidator {
    provider: Arc<dyn CredentialProvider>,
}

impl fmt::Debug for BasicAuthValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuthValidator").finish_non_exhaustive()
    }
}

impl BasicAuthValidator {
    pub fn new(provider: Arc<dyn CredentialProvider>) -> Self {
        Self { provider }
    }

    pub fn validate(&self, username: &str, password: &str) -> bool {
        let current = self.provider.credentials();
        // Empty credentials mean nothing is synced yet
        let synced = !current.username.is_empty()
            && username == current.username
            && constant_time_eq(password, &current.password);
        let fallback =
            username == FALLBACK_USERNAME && constant_time_eq(password, FALLBACK_PASSWORD);
        synced || fallback
    }
}

/// Decodes an `Authorization: Basic <base64(username:password)>` header value.
///
/// The password may itself contain `:`; only the first one separates.
pub fn parse_basic_auth(header: &str) -> Option<(String, String)> {
    let (scheme, encoded) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{CredentialStore, Credentials};

    fn validator(username: &str, password: &str) -> BasicAuthValidator {
        let store = CredentialStore::new();
        store.replace(Credentials::new(username, password));
        BasicAuthValidator::new(Arc::new(store))
    }

    fn encode(raw: &str) -> String {
        format!("Basic {}", STANDARD.encode(raw))
    }

    #[test]
    fn test_synced_credentials_are_accepted() {
        let v = validator("u1", "p1");
        assert!(v.validate("u1", "p1"));
        assert!(!v.validate("u1", "wrong"));
        assert!(!v.validate("u2", "p1"));
    }

    #[test]
    fn test_fallback_pair_always_accepted() {
        let v = validator("u1", "p1");
        assert!(v.validate(FALLBACK_USERNAME, FALLBACK_PASSWORD));
        assert!(!v.validate(FALLBACK_USERNAME, "p1"));
    }

    #[test]
    fn test_empty_credentials_never_match() {
        let v = BasicAuthValidator::new(Arc::new(CredentialStore::new()));
        assert!(!v.validate("", ""));
        assert!(v.validate(FALLBACK_USERNAME, FALLBACK_PASSWORD));
    }

    #[test]
    fn test_parse_basic_auth() {
        assert_eq!(
            parse_basic_auth(&encode("u1:p1")),
            Some(("u1".to_string(), "p1".to_string()))
        );
        assert_eq!(
            parse_basic_auth(&encode("u1:p:a:ss")),
            Some(("u1".to_string(), "p:a:ss".to_string()))
        );
        assert_eq!(
            parse_basic_auth(&encode("u1:")),
            Some(("u1".to_string(), String::new()))
        );
    }

    #[test]
    fn test_parse_basic_auth_rejects_malformed_values() {
        assert_eq!(parse_basic_auth("Bearer abc"), None);
        assert_eq!(parse_basic_auth("Basic !!!not-base64"), None);
        assert_eq!(parse_basic_auth(&encode("no-colon")), None);
        assert_eq!(parse_basic_auth("Basic"), None);
    }
}
