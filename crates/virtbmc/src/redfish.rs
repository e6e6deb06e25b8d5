//! Redfish service root and session endpoints.
//!
//! | Method | Path                                      | Auth |
//! |--------|-------------------------------------------|------|
//! | GET    | `/redfish/v1`                             | no   |
//! | POST   | `/redfish/v1/SessionService/Sessions`     | no   |
//! | GET    | `/redfish/v1/SessionService/Sessions/{id}`| yes  |
//! | DELETE | `/redfish/v1/SessionService/Sessions/{id}`| yes  |

use crate::session::{AUTH_TOKEN_HEADER, Authenticator, SessionInfo, derive_token, require_auth};
use axum::extract::{Path, State};
use axum::http::header::LOCATION;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router, middleware};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

const SERVICE_ROOT: &str = "/redfish/v1";
const SESSIONS: &str = "/redfish/v1/SessionService/Sessions";

/// Body of a session creation request
#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    #[serde(rename = "UserName")]
    pub user_name: String,
    #[serde(rename = "Password")]
    pub password: String,
}

/// Builds the Redfish router.
pub fn router(auth: Arc<Authenticator>) -> Router {
    let protected = Router::new()
        .route(&format!("{SESSIONS}/{{id}}"), get(get_session).delete(delete_session))
        .route_layer(middleware::from_fn_with_state(auth.clone(), require_auth));

    Router::new()
        .route(SERVICE_ROOT, get(service_root))
        .route(SESSIONS, post(create_session))
        .merge(protected)
        .with_state(auth)
        .layer(TraceLayer::new_for_http())
}

fn session_uri(id: &str) -> String {
    format!("{SESSIONS}/{id}")
}

fn session_body(info: &SessionInfo) -> Value {
    json!({
        "@odata.id": session_uri(&info.id),
        "@odata.type": "#Session.v1_0_0.Session",
        "Id": info.id,
        "Name": "User Session",
        "UserName": info.username,
    })
}

fn error_response(status: StatusCode, message: &str) -> Response {
    let body = json!({
        "error": {
            "code": "Base.1.0.GeneralError",
            "message": message,
        }
    });
    (status, Json(body)).into_response()
}

async fn service_root() -> Json<Value> {
    Json(json!({
        "@odata.id": SERVICE_ROOT,
        "@odata.type": "#ServiceRoot.v1_5_0.ServiceRoot",
        "Id": "RootService",
        "Name": "Root Service",
        "RedfishVersion": "1.6.0",
        "SessionService": { "@odata.id": "/redfish/v1/SessionService" },
        "Links": { "Sessions": { "@odata.id": SESSIONS } },
    }))
}

async fn create_session(
    State(auth): State<Arc<Authenticator>>,
    Json(req): Json<SessionRequest>,
) -> Response {
    if !auth.basic().validate(&req.user_name, &req.password) {
        warn!(username = %req.user_name, "Session login failed");
        return error_response(StatusCode::UNAUTHORIZED, "Invalid username or password");
    }

    let info = SessionInfo::new(uuid::Uuid::new_v4().to_string(), req.user_name);
    let token = auth.tokens().add(info.clone());
    info!(session = %info.id, username = %info.username, "Session created");

    let mut headers = HeaderMap::new();
    // Hex digests and UUIDs are always valid header values
    if let Ok(value) = HeaderValue::from_str(&token) {
        headers.insert(AUTH_TOKEN_HEADER, value);
    }
    if let Ok(value) = HeaderValue::from_str(&session_uri(&info.id)) {
        headers.insert(LOCATION, value);
    }
    (StatusCode::CREATED, headers, Json(session_body(&info))).into_response()
}

async fn get_session(State(auth): State<Arc<Authenticator>>, Path(id): Path<String>) -> Response {
    match auth.tokens().get_by_session_id(&id) {
        Some((_, info)) => Json(session_body(&info)).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "Session not found"),
    }
}

async fn delete_session(
    State(auth): State<Arc<Authenticator>>,
    Path(id): Path<String>,
) -> Response {
    match auth.tokens().get_by_session_id(&id) {
        Some((_, info)) => {
            auth.tokens().remove(&derive_token(&info));
            info!(session = %info.id, "Session deleted");
            StatusCode::NO_CONTENT.into_response()
        }
        None => error_response(StatusCode::NOT_FOUND, "Session not found"),
    }
}
