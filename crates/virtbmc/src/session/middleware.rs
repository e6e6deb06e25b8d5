//! Axum middleware enforcing the session layer on protected routes.

use super::{AuthDecision, Authenticator};
use axum::body::Body;
use axum::extract::State;
use axum::http::header::WWW_AUTHENTICATE;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tracing::debug;

/// Rejects unauthorized requests with 401 and a Basic challenge.
///
/// On success the `AuthDecision` is stored in the request extensions.
pub async fn require_auth(
    State(auth): State<Arc<Authenticator>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let decision = auth.authorize(req.headers());
    if decision == AuthDecision::Rejected {
        debug!(path = %req.uri().path(), "Rejected unauthenticated request");
        return (StatusCode::UNAUTHORIZED, [(WWW_AUTHENTICATE, "Basic")]).into_response();
    }
    req.extensions_mut().insert(decision);
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::CredentialStore;
    use crate::session::{AUTH_TOKEN_HEADER, BasicAuthValidator, SessionInfo, TokenStore};
    use axum::Router;
    use axum::routing::get;
    use tower::ServiceExt;

    fn app(auth: Arc<Authenticator>) -> Router {
        Router::new()
            .route("/protected", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn_with_state(auth, require_auth))
    }

    fn authenticator() -> Arc<Authenticator> {
        Arc::new(Authenticator::new(
            Arc::new(TokenStore::new()),
            BasicAuthValidator::new(Arc::new(CredentialStore::new())),
        ))
    }

    #[tokio::test]
    async fn rejects_without_credentials() -> anyhow::Result<()> {
        let resp = app(authenticator())
            .oneshot(Request::builder().uri("/protected").body(Body::empty())?)
            .await?;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            resp.headers().get(WWW_AUTHENTICATE).and_then(|v| v.to_str().ok()),
            Some("Basic")
        );
        Ok(())
    }

    #[tokio::test]
    async fn passes_with_session_token() -> anyhow::Result<()> {
        let auth = authenticator();
        let token = auth.tokens().add(SessionInfo::new("s1", "u1"));
        let req = Request::builder()
            .uri("/protected")
            .header(AUTH_TOKEN_HEADER, token)
            .body(Body::empty())?;
        let resp = app(auth).oneshot(req).await?;
        assert_eq!(resp.status(), StatusCode::OK);
        Ok(())
    }
}
