pub mod grib;
pub mod session;

use axum::extract::State;
use axum::middleware;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, put};
use axum::Router;

use crate::binder;
use crate::error::ApiError;
use crate::state::AppState;

/// Build the full router: web pages, JSON API and the hub.
///
/// Routes that bind a per-request session sit behind the
/// [`binder::session_scope`] middleware, which emits the session cookie.
/// The hub binds per connection and handles its own cookie.
pub fn router() -> Router<AppState> {
    let scoped = Router::new()
        // Web tier
        .route("/", get(crate::web::home))
        .route("/grib", get(crate::web::grib))
        // API tier
        .route("/api/session", get(session::current))
        .route(
            "/api/session/attributes/:key",
            put(session::set_attribute).delete(session::remove_attribute),
        )
        .route("/api/grib/view", get(grib::get_view).put(grib::update_view))
        .route("/api/grib/legend", get(grib::get_legend))
        .route_layer(middleware::from_fn(binder::session_scope));

    let unscoped = Router::new()
        .route("/health", get(health))
        .route("/api/sessions", get(session::list_sessions))
        .route("/api/grib/layers", get(grib::list_layers))
        .route("/api/hub/connections", get(hub_connections))
        // Real-time tier
        .route("/hub", get(crate::hub::ws::hub_ws));

    unscoped.merge(scoped)
}

async fn health(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": state.sessions.len()?,
        "hub_connections": state.hub.len(),
    })))
}

async fn hub_connections(State(state): State<AppState>) -> impl IntoResponse {
    let connections = state.hub.list();
    Json(serde_json::json!({
        "count": connections.len(),
        "connections": connections,
    }))
}
