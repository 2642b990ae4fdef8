//! HTTP integration tests: web pages and JSON API share one session per
//! client, bound per request through the session cookie.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use wi_domain::config::Config;
use wi_domain::SessionVariant;
use wi_gateway::api;
use wi_gateway::bootstrap;
use wi_gateway::state::AppState;
use wi_sessions::{SessionToken, StoredSession};

// ── Helpers ─────────────────────────────────────────────────────────────

fn test_state() -> AppState {
    bootstrap::build_app_state(Arc::new(Config::default())).unwrap()
}

fn app(state: &AppState) -> Router {
    api::router().with_state(state.clone())
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(c) = cookie {
        builder = builder.header(header::COOKIE, c);
    }
    builder.body(Body::empty()).unwrap()
}

fn put_json(uri: &str, cookie: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header(header::COOKIE, cookie)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn set_cookie(resp: &axum::response::Response) -> Option<String> {
    resp.headers()
        .get(header::SET_COOKIE)
        .map(|v| v.to_str().unwrap().to_string())
}

/// `sid=<token>` from a `Set-Cookie` value.
fn cookie_pair(set_cookie: &str) -> String {
    set_cookie.split(';').next().unwrap().trim().to_string()
}

// ── Cookie issuance ─────────────────────────────────────────────────────

#[tokio::test]
async fn first_visit_issues_cookie_with_attributes() {
    let state = test_state();
    let resp = app(&state).oneshot(get("/api/session", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let cookie = set_cookie(&resp).expect("new session must set a cookie");
    assert!(cookie.starts_with("sid="));
    assert!(cookie.contains("Path=/"));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Strict"));
    assert!(!cookie.contains("Secure"));
    assert_eq!(
        resp.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-cache=\"Set-Cookie\""
    );

    let body = body_json(resp).await;
    assert_eq!(format!("sid={}", body["id"].as_str().unwrap()), cookie_pair(&cookie));
    assert_eq!(body["variant"], "grib");
    assert_eq!(state.sessions.len().unwrap(), 1);
}

#[tokio::test]
async fn returning_client_keeps_session_without_new_cookie() {
    let state = test_state();
    let first = app(&state).oneshot(get("/api/session", None)).await.unwrap();
    let pair = cookie_pair(&set_cookie(&first).unwrap());
    let first_id = body_json(first).await["id"].clone();

    let second = app(&state)
        .oneshot(get("/api/session", Some(&pair)))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    assert!(set_cookie(&second).is_none());
    assert_eq!(body_json(second).await["id"], first_id);
    assert_eq!(state.sessions.len().unwrap(), 1);
}

#[tokio::test]
async fn malformed_cookie_starts_a_new_session() {
    let state = test_state();
    let resp = app(&state)
        .oneshot(get("/api/session", Some("sid=not-a-guid")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let cookie = set_cookie(&resp).expect("replacement cookie");
    assert_ne!(cookie_pair(&cookie), "sid=not-a-guid");
    assert_eq!(state.sessions.len().unwrap(), 1);
}

#[tokio::test]
async fn unknown_token_is_not_adopted() {
    let state = test_state();
    let stale = SessionToken::generate();
    let resp = app(&state)
        .oneshot(get("/api/session", Some(&format!("sid={stale}"))))
        .await
        .unwrap();
    let cookie = set_cookie(&resp).expect("fresh cookie");
    assert_ne!(cookie_pair(&cookie), format!("sid={stale}"));
    assert!(!state.sessions.contains(&stale).unwrap());
}

fn forwarded_https() -> Request<Body> {
    Request::builder()
        .uri("/api/session")
        .header("x-forwarded-proto", "https")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn forwarded_https_marks_cookie_secure_behind_trusted_proxy() {
    let mut config = Config::default();
    config.server.trust_forwarded_proto = true;
    let state = bootstrap::build_app_state(Arc::new(config)).unwrap();
    let resp = app(&state).oneshot(forwarded_https()).await.unwrap();
    assert!(set_cookie(&resp).unwrap().ends_with("; Secure"));
}

#[tokio::test]
async fn forwarded_proto_is_ignored_by_default() {
    let state = test_state();
    let resp = app(&state).oneshot(forwarded_https()).await.unwrap();
    assert!(!set_cookie(&resp).unwrap().contains("Secure"));
}

// ── Tier sharing ────────────────────────────────────────────────────────

#[tokio::test]
async fn web_page_and_api_share_the_session() {
    let state = test_state();
    let page = app(&state).oneshot(get("/grib", None)).await.unwrap();
    assert_eq!(page.status(), StatusCode::OK);
    let pair = cookie_pair(&set_cookie(&page).unwrap());

    let update = app(&state)
        .oneshot(put_json(
            "/api/grib/view",
            &pair,
            serde_json::json!({ "layers": ["waves", "gust"], "legend_visible": false }),
        ))
        .await
        .unwrap();
    assert_eq!(update.status(), StatusCode::OK);
    assert!(set_cookie(&update).is_none());
    let body = body_json(update).await;
    assert_eq!(body["view"]["layers"], serde_json::json!(["waves", "gust"]));
    assert_eq!(body["pushed"], 0);

    let legend = app(&state)
        .oneshot(get("/api/grib/legend", Some(&pair)))
        .await
        .unwrap();
    let legend = body_json(legend).await;
    assert_eq!(legend["visible"], false);
    assert_eq!(legend["entries"][0]["name"], "waves");
    assert_eq!(state.sessions.len().unwrap(), 1);
}

#[tokio::test]
async fn attributes_persist_across_requests() {
    let state = test_state();
    let first = app(&state).oneshot(get("/", None)).await.unwrap();
    let pair = cookie_pair(&set_cookie(&first).unwrap());

    let resp = app(&state)
        .oneshot(put_json(
            "/api/session/attributes/units",
            &pair,
            serde_json::json!("metric"),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let current = app(&state)
        .oneshot(get("/api/session", Some(&pair)))
        .await
        .unwrap();
    assert_eq!(body_json(current).await["attributes"]["units"], "metric");
}

// ── Failures ────────────────────────────────────────────────────────────

#[tokio::test]
async fn variant_mismatch_is_a_conflict() {
    let state = test_state();
    let token = SessionToken::generate();
    state
        .sessions
        .set(StoredSession::create(SessionVariant::Base, token))
        .unwrap();

    let resp = app(&state)
        .oneshot(get("/api/grib/view", Some(&format!("sid={token}"))))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert!(set_cookie(&resp).is_none());

    // The base-only tiers still accept it.
    let resp = app(&state)
        .oneshot(get("/api/session", Some(&format!("sid={token}"))))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["variant"], "base");
}

#[tokio::test]
async fn closed_store_is_unavailable() {
    let state = test_state();
    state.sessions.close();

    let resp = app(&state).oneshot(get("/api/session", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(set_cookie(&resp).is_none());
    assert!(body_json(resp).await["error"].is_string());
}

#[tokio::test]
async fn unknown_layer_is_rejected_without_mutation() {
    let state = test_state();
    let first = app(&state).oneshot(get("/api/grib/view", None)).await.unwrap();
    let pair = cookie_pair(&set_cookie(&first).unwrap());
    let before = body_json(first).await["layers"].clone();

    let resp = app(&state)
        .oneshot(put_json(
            "/api/grib/view",
            &pair,
            serde_json::json!({ "layers": ["wind", "lava"] }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(resp).await["error"].as_str().unwrap().contains("lava"));

    let after = app(&state)
        .oneshot(get("/api/grib/view", Some(&pair)))
        .await
        .unwrap();
    assert_eq!(body_json(after).await["layers"], before);
}

// ── Unscoped routes ─────────────────────────────────────────────────────

#[tokio::test]
async fn health_and_catalogue_do_not_create_sessions() {
    let state = test_state();
    let health = app(&state).oneshot(get("/health", None)).await.unwrap();
    assert_eq!(health.status(), StatusCode::OK);
    assert!(set_cookie(&health).is_none());

    let layers = app(&state).oneshot(get("/api/grib/layers", None)).await.unwrap();
    assert!(set_cookie(&layers).is_none());
    assert_eq!(body_json(layers).await["count"], 7);

    assert_eq!(state.sessions.len().unwrap(), 0);
}

#[tokio::test]
async fn session_listing_reports_live_sessions() {
    let state = test_state();
    for _ in 0..3 {
        app(&state).oneshot(get("/api/session", None)).await.unwrap();
    }
    let resp = app(&state).oneshot(get("/api/sessions", None)).await.unwrap();
    let body = body_json(resp).await;
    assert_eq!(body["count"], 3);
    assert_eq!(body["sessions"].as_array().unwrap().len(), 3);
}
