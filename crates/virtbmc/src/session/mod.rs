//! Authentication session layer.
//!
//! Every protected request is checked in order:
//! 1. `X-Auth-Token`: authorized if the token maps to a stored session;
//! 2. `Authorization: Basic`: authorized if the pair validates;
//! 3. otherwise rejected.
//!
//! A failed token check always falls through to the Basic check.

pub mod basic;
pub mod middleware;
pub mod token;

pub use basic::{BasicAuthValidator, FALLBACK_PASSWORD, FALLBACK_USERNAME, parse_basic_auth};
pub use middleware::require_auth;
pub use token::{SessionInfo, TokenStore, derive_token};

use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderName};
use std::sync::Arc;
use tracing::debug;

/// Header carrying a session token (`X-Auth-Token`)
pub const AUTH_TOKEN_HEADER: HeaderName = HeaderName::from_static("x-auth-token");

/// Outcome of authorizing one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    /// Authorized by a session token
    Session(SessionInfo),
    /// Authorized by Basic credentials
    Basic { username: String },
    Rejected,
}

impl AuthDecision {
    pub fn is_authorized(&self) -> bool {
        !matches!(self, Self::Rejected)
    }
}

/// Authorizes requests against the token store and the Basic validator
#[derive(Debug, Clone)]
pub struct Authenticator {
    tokens: Arc<TokenStore>,
    basic: BasicAuthValidator,
}

impl Authenticator {
    pub fn new(tokens: Arc<TokenStore>, basic: BasicAuthValidator) -> Self {
        Self { tokens, basic }
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn basic(&self) -> &BasicAuthValidator {
        &self.basic
    }

    pub fn authorize(&self, headers: &HeaderMap) -> AuthDecision {
        if let Some(token) = headers.get(AUTH_TOKEN_HEADER).and_then(|v| v.to_str().ok()) {
            match self.tokens.get(token) {
                Some(session) => return AuthDecision::Session(session),
                None => debug!("Unknown session token, trying Basic credentials"),
            }
        }

        let basic = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_basic_auth);
        if let Some((username, password)) = basic
            && self.basic.validate(&username, &password)
        {
            return AuthDecision::Basic { username };
        }

        AuthDecision::Rejected
    }
}
