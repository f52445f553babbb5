//! HTTP surface
//!
//! Two kinds of legs share this router. JSON API legs authenticate via the
//! `authorization` header and answer structured errors. Browser redirect
//! legs (`oauth/start`, `oauth/continue`) are navigations, not API calls:
//! they never answer JSON and instead redirect to the configured UI error
//! page with `code` and `message` query parameters.

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post, put};
use metrics_exporter_prometheus::PrometheusHandle;
use platform_auth::{AuthVerifier, TokenInfo};
use orcid_link::{LinkManager, SessionManager};
use serde::Deserialize;

use crate::config::UiConfig;
use crate::error::ApiError;

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub struct AppState {
    pub verifier: Arc<AuthVerifier>,
    pub sessions: Arc<SessionManager>,
    pub links: Arc<LinkManager>,
    pub manager_role: String,
    pub ui: UiConfig,
    pub prometheus: PrometheusHandle,
    pub started_at: Instant,
}

/// Build the axum router with all routes and shared state.
///
/// Applies a concurrency limit layer based on `max_connections`.
pub fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_exposition))
        .route("/linking-sessions", post(create_linking_session))
        .route(
            "/linking-sessions/{id}",
            get(get_linking_session).delete(delete_linking_session),
        )
        .route("/linking-sessions/{id}/finish", put(finish_linking_session))
        .route("/linking-sessions/{id}/oauth/start", get(start_linking_session))
        .route(
            "/linking-sessions/oauth/continue",
            get(continue_linking_session),
        )
        .route("/link", get(get_own_link).delete(delete_own_link))
        .route(
            "/link/{username}",
            get(get_link_for_user).delete(delete_link_for_user),
        )
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

fn bearer_credential(headers: &HeaderMap) -> &str {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

/// Verify the caller's credential, yielding the owning username.
async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<TokenInfo, ApiError> {
    Ok(state
        .verifier
        .verify_token(bearer_credential(headers))
        .await?)
}

/// Health endpoint: service identity and uptime.
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let body = serde_json::json!({
        "status": "ok",
        "service": "orcid-link-service",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    });
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus metrics endpoint in text exposition format.
async fn metrics_exposition(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

#[derive(Deserialize)]
struct CreateLinkingSessionRequest {
    username: String,
}

/// POST /linking-sessions: create a linking session for the caller.
async fn create_linking_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<CreateLinkingSessionRequest>,
) -> Result<Response, ApiError> {
    let token = authenticate(&state, &headers).await?;
    let session_id = state.sessions.create(&body.username, &token.user).await?;
    Ok((
        StatusCode::CREATED,
        axum::Json(serde_json::json!({ "session_id": session_id })),
    )
        .into_response())
}

/// GET /linking-sessions/{id}: the owner's view of a completed session.
async fn get_linking_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Result<Response, ApiError> {
    let token = authenticate(&state, &headers).await?;
    let view = state.sessions.get(&session_id, &token.user).await?;
    Ok(axum::Json(view).into_response())
}

/// DELETE /linking-sessions/{id}: abandon a completed session.
async fn delete_linking_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Result<Response, ApiError> {
    let token = authenticate(&state, &headers).await?;
    state.sessions.delete(&session_id, &token.user).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// PUT /linking-sessions/{id}/finish: finalize a completed session into a
/// durable link.
async fn finish_linking_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Result<Response, ApiError> {
    let token = authenticate(&state, &headers).await?;
    state.sessions.finish(&session_id, &token.user).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[derive(Deserialize)]
struct StartParams {
    return_link: Option<String>,
    #[serde(default)]
    skip_prompt: bool,
}

/// GET /linking-sessions/{id}/oauth/start: browser leg. Records the start
/// of the consent flow and redirects to ORCID's authorization URL.
async fn start_linking_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(params): Query<StartParams>,
) -> Response {
    match state
        .sessions
        .start(&session_id, params.return_link, params.skip_prompt)
        .await
    {
        Ok(authorize_url) => Redirect::temporary(&authorize_url).into_response(),
        Err(e) => ui_error_redirect(&state.ui, &e),
    }
}

#[derive(Deserialize)]
struct ContinueParams {
    code: Option<String>,
    /// The session id, carried through ORCID's redirect unchanged
    state: Option<String>,
    /// Set by ORCID when the user denies the grant
    error: Option<String>,
}

/// GET /linking-sessions/oauth/continue: browser leg, the redirect target
/// registered with ORCID. Exchanges the code and forwards the browser to
/// the UI completion page.
async fn continue_linking_session(
    State(state): State<AppState>,
    Query(params): Query<ContinueParams>,
) -> Response {
    if let Some(error) = params.error {
        return ui_error_redirect(
            &state.ui,
            &orcid_link::Error::Upstream(format!("ORCID authorization failed: {error}")),
        );
    }
    let (Some(code), Some(session_id)) = (params.code, params.state) else {
        return ui_error_redirect(
            &state.ui,
            &orcid_link::Error::Upstream(
                "continuation redirect missing code or state parameter".into(),
            ),
        );
    };

    match state.sessions.continue_linking(&session_id, &code).await {
        Ok(outcome) => {
            let mut target = format!(
                "{}?session_id={}",
                state.ui.completion_url, session_id
            );
            if let Some(return_link) = outcome.return_link {
                target.push_str("&return_link=");
                target.push_str(&urlencoded(&return_link));
            }
            Redirect::temporary(&target).into_response()
        }
        Err(e) => ui_error_redirect(&state.ui, &e),
    }
}

/// GET /link: the caller's own link, full projection.
async fn get_own_link(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let token = authenticate(&state, &headers).await?;
    let view = state.links.get_owner_view(&token.user).await?;
    Ok(axum::Json(view).into_response())
}

/// GET /link/{username}: another user's link. The owner gets the full
/// projection, anyone else the minimal one; both are success responses.
async fn get_link_for_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(username): Path<String>,
) -> Result<Response, ApiError> {
    let token = authenticate(&state, &headers).await?;
    if token.user == username {
        let view = state.links.get_owner_view(&username).await?;
        Ok(axum::Json(view).into_response())
    } else {
        let view = state.links.get_other_view(&username).await?;
        Ok(axum::Json(view).into_response())
    }
}

/// DELETE /link: unlink the caller's own ORCID account.
async fn delete_own_link(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let token = authenticate(&state, &headers).await?;
    state.links.delete(&token.user, &token.user, false).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// DELETE /link/{username}: unlink another user's ORCID account. Requires
/// the configured manager role unless the caller is the owner.
async fn delete_link_for_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(username): Path<String>,
) -> Result<Response, ApiError> {
    let token = authenticate(&state, &headers).await?;
    let is_manager = if token.user == username {
        false
    } else {
        let account = state
            .verifier
            .verify_account(bearer_credential(&headers))
            .await?;
        account.has_custom_role(&state.manager_role)
    };
    state.links.delete(&username, &token.user, is_manager).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// Redirect a failed browser leg to the UI error page, encoding the
/// taxonomy code and message as query parameters.
fn ui_error_redirect(ui: &UiConfig, err: &orcid_link::Error) -> Response {
    let target = format!(
        "{}?code={}&message={}",
        ui.error_url,
        err.code(),
        urlencoded(&err.to_string())
    );
    Redirect::temporary(&target).into_response()
}

/// Minimal URL encoding for query parameter values.
fn urlencoded(s: &str) -> String {
    s.replace('%', "%25")
        .replace(' ', "%20")
        .replace('&', "%26")
        .replace('?', "%3F")
        .replace('#', "%23")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use common::Secret;
    use linkstore::{LinkRecord, LinkStore};
    use orcid::{OAuthTokenSet, OrcidOAuthClient};
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tower::ServiceExt;

    const SESSION_LIFETIME: Duration = Duration::from_secs(600);
    const RETIREMENT_AGE: Duration = Duration::from_secs(1_209_600);

    /// Create a PrometheusHandle for tests without installing a global
    /// recorder (only one global recorder can exist per process).
    fn test_prometheus_handle() -> PrometheusHandle {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        recorder.handle()
    }

    /// Mock auth service: credentials of the form "tok-<user>" verify as
    /// <user>; anything else is an invalid token. The "admin" user holds
    /// the orcidlink_admin custom role.
    async fn start_auth_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        fn user_of(headers: &HeaderMap) -> Option<String> {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|cred| cred.strip_prefix("tok-"))
                .map(String::from)
        }

        type MockResponse = (
            StatusCode,
            [(axum::http::HeaderName, &'static str); 1],
            String,
        );

        fn invalid() -> MockResponse {
            (
                StatusCode::UNAUTHORIZED,
                [(header::CONTENT_TYPE, "application/json")],
                r#"{"error": {"apperror": "Invalid token", "message": "10020 Invalid token"}}"#
                    .to_string(),
            )
        }

        tokio::spawn(async move {
            let app = Router::new()
                .route(
                    "/api/V2/token",
                    get(|headers: HeaderMap| async move {
                        match user_of(&headers) {
                            Some(user) => (
                                StatusCode::OK,
                                [(header::CONTENT_TYPE, "application/json")],
                                format!(
                                    r#"{{"id": "tid-1", "type": "Login",
                                         "created": 1754000000000, "expires": 1754086400000,
                                         "user": "{user}", "cachefor": 300000}}"#
                                ),
                            ),
                            None => invalid(),
                        }
                    }),
                )
                .route(
                    "/api/V2/me",
                    get(|headers: HeaderMap| async move {
                        match user_of(&headers) {
                            Some(user) => {
                                let customroles = if user == "admin" {
                                    r#"["orcidlink_admin"]"#
                                } else {
                                    "[]"
                                };
                                (
                                    StatusCode::OK,
                                    [(header::CONTENT_TYPE, "application/json")],
                                    format!(
                                        r#"{{"user": "{user}", "display": "User {user}",
                                             "email": "{user}@example.org", "roles": [],
                                             "customroles": {customroles},
                                             "idents": [], "policyids": []}}"#
                                    ),
                                )
                            }
                            None => invalid(),
                        }
                    }),
                );
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{addr}")
    }

    /// Mock ORCID OAuth API: /token answers a fixed token set, /revoke
    /// answers 204.
    async fn start_orcid_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let app = Router::new()
                .route(
                    "/token",
                    post(|| async {
                        (
                            StatusCode::OK,
                            [(header::CONTENT_TYPE, "application/json")],
                            r#"{"access_token": "tok1", "token_type": "bearer",
                                "refresh_token": "rt1", "expires_in": 600,
                                "scope": "/read-limited openid", "orcid": "0000-0001",
                                "name": "Ada Lovelace", "id_token": "eyJ.test"}"#,
                        )
                    }),
                )
                .route("/revoke", post(|| async { StatusCode::NO_CONTENT }));
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{addr}")
    }

    async fn test_state(dir: &tempfile::TempDir) -> (AppState, Arc<LinkStore>) {
        let auth_base = start_auth_server().await;
        let orcid_base = start_orcid_server().await;

        let store = Arc::new(LinkStore::open(dir.path()).await.unwrap());
        let orcid_client = Arc::new(OrcidOAuthClient::new(
            reqwest::Client::new(),
            orcid_base,
            "client-abc",
            Secret::new("secret-xyz".to_string()),
            "https://services.example.org/linking-sessions/oauth/continue",
        ));
        let verifier = Arc::new(AuthVerifier::new(
            reqwest::Client::new(),
            auth_base,
            100,
            Duration::from_secs(300),
        ));

        let state = AppState {
            verifier,
            sessions: Arc::new(SessionManager::new(
                store.clone(),
                orcid_client.clone(),
                SESSION_LIFETIME,
                RETIREMENT_AGE,
            )),
            links: Arc::new(LinkManager::new(
                store.clone(),
                orcid_client,
                RETIREMENT_AGE,
            )),
            manager_role: "orcidlink_admin".into(),
            ui: UiConfig {
                completion_url: "https://ui.example.org/orcidlink/continue".into(),
                error_url: "https://ui.example.org/orcidlink/error".into(),
            },
            prometheus: test_prometheus_handle(),
            started_at: Instant::now(),
        };
        (state, store)
    }

    async fn response_json(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn location(response: &Response) -> String {
        response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    fn seed_link(username: &str) -> LinkRecord {
        LinkRecord {
            username: username.into(),
            orcid_auth: OAuthTokenSet {
                access_token: "tokx".into(),
                token_type: "bearer".into(),
                refresh_token: "rtx".into(),
                expires_in: 600,
                scope: "/read-limited".into(),
                orcid: "0000-0009".into(),
                name: "Seeded User".into(),
                id_token: None,
            },
            created_at: 1000,
            expires_at: 4_102_444_800_000,
            retires_at: 4_102_444_800_000,
        }
    }

    #[tokio::test]
    async fn health_endpoint_reports_service_identity() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(&dir).await;
        let app = build_router(state, 1000);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["service"], "orcid-link-service");
        assert!(json["uptime_seconds"].is_u64());
    }

    #[tokio::test]
    async fn unauthenticated_create_is_401_with_code_1010() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(&dir).await;
        let app = build_router(state, 1000);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/linking-sessions")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"username": "foo"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = response_json(response).await;
        assert_eq!(json["error"]["code"], 1010);
    }

    #[tokio::test]
    async fn create_for_another_user_is_403_with_code_1011() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(&dir).await;
        let app = build_router(state, 1000);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/linking-sessions")
                    .header("content-type", "application/json")
                    .header("authorization", "tok-mallory")
                    .body(Body::from(r#"{"username": "foo"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let json = response_json(response).await;
        assert_eq!(json["error"]["code"], 1011);
    }

    #[tokio::test]
    async fn full_linking_flow_over_http() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(&dir).await;
        let app = build_router(state, 1000);

        // create
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/linking-sessions")
                    .header("content-type", "application/json")
                    .header("authorization", "tok-foo")
                    .body(Body::from(r#"{"username": "foo"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let session_id = response_json(response).await["session_id"]
            .as_str()
            .unwrap()
            .to_string();

        // start: browser redirect to ORCID's consent screen
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!(
                        "/linking-sessions/{session_id}/oauth/start?return_link=https://x"
                    ))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        let target = location(&response);
        assert!(target.contains("/authorize?"), "got {target}");
        assert!(target.contains(&format!("state={session_id}")));

        // continue: ORCID redirects back with the code
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!(
                        "/linking-sessions/oauth/continue?code=abc123&state={session_id}"
                    ))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        let target = location(&response);
        assert!(
            target.starts_with("https://ui.example.org/orcidlink/continue?session_id="),
            "got {target}"
        );
        assert!(target.contains("return_link=https"), "got {target}");

        // the completed session is visible to its owner, without tokens
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/linking-sessions/{session_id}"))
                    .header("authorization", "tok-foo")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["orcid"]["orcid"], "0000-0001");
        assert!(json["orcid"].get("access_token").is_none());

        // finish
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri(format!("/linking-sessions/{session_id}/finish"))
                    .header("authorization", "tok-foo")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        // the link now exists and carries the exchanged ORCID iD
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/link")
                    .header("authorization", "tok-foo")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["orcid"], "0000-0001");
        assert_eq!(json["name"], "Ada Lovelace");

        // a second finish finds no session
        let response = app
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri(format!("/linking-sessions/{session_id}/finish"))
                    .header("authorization", "tok-foo")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = response_json(response).await;
        assert_eq!(json["error"]["code"], 1020);
    }

    #[tokio::test]
    async fn delete_own_link_without_link_is_404_code_1020() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(&dir).await;
        let app = build_router(state, 1000);

        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/link")
                    .header("authorization", "tok-foo")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = response_json(response).await;
        assert_eq!(json["error"]["code"], 1020);
    }

    #[tokio::test]
    async fn foreign_link_view_is_minimal() {
        let dir = tempfile::tempdir().unwrap();
        let (state, store) = test_state(&dir).await;
        store
            .links()
            .insert("foo".into(), seed_link("foo"))
            .await
            .unwrap();
        let app = build_router(state, 1000);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/link/foo")
                    .header("authorization", "tok-bar")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["orcid"], "0000-0009");
        assert_eq!(json["name"], "Seeded User");
        assert!(json.get("scope").is_none(), "non-owner view must omit scope");
        assert!(json.get("retires_at").is_none());
    }

    #[tokio::test]
    async fn owner_link_view_via_username_path_is_full() {
        let dir = tempfile::tempdir().unwrap();
        let (state, store) = test_state(&dir).await;
        store
            .links()
            .insert("foo".into(), seed_link("foo"))
            .await
            .unwrap();
        let app = build_router(state, 1000);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/link/foo")
                    .header("authorization", "tok-foo")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["scope"], "/read-limited");
        assert!(json["retires_at"].is_u64());
    }

    #[tokio::test]
    async fn manager_role_gates_foreign_deletion() {
        let dir = tempfile::tempdir().unwrap();
        let (state, store) = test_state(&dir).await;
        store
            .links()
            .insert("foo".into(), seed_link("foo"))
            .await
            .unwrap();
        let app = build_router(state, 1000);

        // a plain user cannot delete someone else's link
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/link/foo")
                    .header("authorization", "tok-bar")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let json = response_json(response).await;
        assert_eq!(json["error"]["code"], 1011);
        assert!(store.links().get("foo").await.is_some());

        // the manager role permits it
        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/link/foo")
                    .header("authorization", "tok-admin")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(store.links().get("foo").await.is_none());
    }

    #[tokio::test]
    async fn continue_without_code_redirects_to_error_page() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(&dir).await;
        let app = build_router(state, 1000);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/linking-sessions/oauth/continue?state=abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        let target = location(&response);
        assert!(
            target.starts_with("https://ui.example.org/orcidlink/error?code=1040"),
            "got {target}"
        );
        assert!(target.contains("message="), "got {target}");
    }

    #[tokio::test]
    async fn provider_denial_redirects_to_error_page() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(&dir).await;
        let app = build_router(state, 1000);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/linking-sessions/oauth/continue?error=access_denied&state=abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        let target = location(&response);
        assert!(target.contains("access_denied"), "got {target}");
    }

    #[tokio::test]
    async fn start_on_unknown_session_redirects_to_error_page() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(&dir).await;
        let app = build_router(state, 1000);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/linking-sessions/no-such-session/oauth/start")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        let target = location(&response);
        assert!(target.contains("code=1020"), "got {target}");
    }

    #[tokio::test]
    async fn get_session_by_non_owner_is_403() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(&dir).await;
        let sessions = state.sessions.clone();
        let app = build_router(state, 1000);

        let session_id = sessions.create("foo", "foo").await.unwrap();
        sessions.start(&session_id, None, false).await.unwrap();
        sessions
            .continue_linking(&session_id, "abc123")
            .await
            .unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/linking-sessions/{session_id}"))
                    .header("authorization", "tok-mallory")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let json = response_json(response).await;
        assert_eq!(json["error"]["code"], 1011);
    }

    #[tokio::test]
    async fn metrics_endpoint_returns_prometheus_format() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(&dir).await;
        let app = build_router(state, 1000);

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(content_type.contains("text/plain"));
    }
}
