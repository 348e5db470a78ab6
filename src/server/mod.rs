//! HTTP surface served by `inatd`.
//!
//! Every resource route hands a sanitized request to the shared
//! [`Fetcher`] and passes the upstream JSON through at 200. Failures become
//! an error envelope:
//!
//! ```json
//! { "detail": "upstream rejected request (404): ...", "upstream_status": 404 }
//! ```
//!
//! | error                  | status |
//! |------------------------|--------|
//! | `UpstreamRejected`     | 502    |
//! | `InvalidResponse`      | 502    |
//! | `UpstreamUnavailable`  | 504    |
//! | `InvalidInput`         | 400    |
//! | `Configuration`        | 500    |

pub mod config;

use std::sync::Arc;

use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

use crate::forward::ForwardPolicy;
use crate::types::RequestParams;
use crate::{Fetcher, ProxyError};

/// Shared state for all handlers.
pub struct AppState {
    fetcher: Fetcher,
    observations: ForwardPolicy,
    users: ForwardPolicy,
}

impl AppState {
    pub fn new(fetcher: Fetcher) -> Self {
        Self {
            fetcher,
            observations: ForwardPolicy::observations(),
            users: ForwardPolicy::new(["per_page"]),
        }
    }

    /// Replace the allow-list used for `/observations`.
    pub fn with_observation_policy(mut self, policy: ForwardPolicy) -> Self {
        self.observations = policy;
        self
    }
}

/// Build the router with the default forwarding policies.
pub fn router(fetcher: Fetcher) -> Router {
    router_with_state(AppState::new(fetcher))
}

/// Build the router from a prepared [`AppState`].
pub fn router_with_state(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/observations", get(observations))
        .route("/observations/{id}", get(observation_by_id))
        .route("/taxa/{id}", get(taxon_by_id))
        .route("/users/{username}", get(user_by_login))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

type ApiResult = Result<Json<Value>, ProxyError>;

/// GET /health — static liveness payload, never touches upstream.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": crate::version::version_string(),
    }))
}

/// GET /observations — allow-listed search passthrough.
async fn observations(
    State(state): State<Arc<AppState>>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> ApiResult {
    let Query(pairs) = query?;
    let params = state.observations.sanitize(pairs);
    state.fetcher.fetch("observations", &params).await.map(Json)
}

/// GET /observations/{id}
async fn observation_by_id(
    State(state): State<Arc<AppState>>,
    id: Result<Path<u64>, PathRejection>,
) -> ApiResult {
    let Path(id) = id?;
    state
        .fetcher
        .fetch(&format!("observations/{id}"), &RequestParams::new())
        .await
        .map(Json)
}

/// GET /taxa/{id}
async fn taxon_by_id(
    State(state): State<Arc<AppState>>,
    id: Result<Path<u64>, PathRejection>,
) -> ApiResult {
    let Path(id) = id?;
    state
        .fetcher
        .fetch(&format!("taxa/{id}"), &RequestParams::new())
        .await
        .map(Json)
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    per_page: Option<String>,
}

/// GET /users/{username}
async fn user_by_login(
    State(state): State<Arc<AppState>>,
    username: Result<Path<String>, PathRejection>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult {
    let (Path(username), Query(query)) = (username?, query?);
    validate_login(&username)?;
    let params =
        RequestParams::new().with("per_page", state.users.per_page(query.per_page.as_deref()));
    state
        .fetcher
        .fetch(&format!("users/{username}"), &params)
        .await
        .map(Json)
}

/// Logins go into the upstream path, so anything that could change the
/// path (`/`, `..`, `?`, `#`) is refused.
fn validate_login(login: &str) -> Result<(), ProxyError> {
    let ok = !login.is_empty()
        && login.len() <= 64
        && login
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(ProxyError::InvalidInput(format!("invalid user login: {login:?}")))
    }
}

impl ProxyError {
    /// HTTP status returned to the client for this error.
    pub fn http_status(&self) -> StatusCode {
        match self {
            ProxyError::UpstreamRejected { .. } | ProxyError::InvalidResponse(_) => {
                StatusCode::BAD_GATEWAY
            }
            ProxyError::UpstreamUnavailable { .. } => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ProxyError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<PathRejection> for ProxyError {
    fn from(rejection: PathRejection) -> Self {
        ProxyError::InvalidInput(rejection.body_text())
    }
}

impl From<QueryRejection> for ProxyError {
    fn from(rejection: QueryRejection) -> Self {
        ProxyError::InvalidInput(rejection.body_text())
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "detail": self.to_string(),
            "upstream_status": self.upstream_status(),
        }));
        (self.http_status(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_is_static() {
        let Json(body) = health().await;
        assert_eq!(body["status"], "ok");
        assert!(body["version"].is_string());
    }

    #[test]
    fn login_validation() {
        assert!(validate_login("kueda").is_ok());
        assert!(validate_login("some_user-2").is_ok());
        assert!(validate_login("").is_err());
        assert!(validate_login("../taxa").is_err());
        assert!(validate_login("a/b").is_err());
        assert!(validate_login("a?b=1").is_err());
    }

    #[test]
    fn error_status_mapping() {
        let rejected = ProxyError::UpstreamRejected {
            status: 404,
            message: "nope".into(),
        };
        assert_eq!(rejected.http_status(), StatusCode::BAD_GATEWAY);
        let unavailable = ProxyError::UpstreamUnavailable {
            attempts: 6,
            last_error: "server error (503)".into(),
        };
        assert_eq!(unavailable.http_status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            ProxyError::InvalidInput("x".into()).http_status(),
            StatusCode::BAD_REQUEST
        );
    }
}
