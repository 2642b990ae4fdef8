//! Session API endpoints.
//!
//! - `GET    /api/session`                  the caller's session identity
//! - `PUT    /api/session/attributes/:key`  set a base attribute
//! - `DELETE /api/session/attributes/:key`  remove a base attribute
//! - `GET    /api/sessions`                 store introspection (no session bound)

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Json};
use serde::Serialize;
use std::collections::HashMap;

use wi_sessions::{SessionSummary, StoredSession};

use crate::binder::AnySession;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
struct SessionView {
    id: String,
    variant: String,
    created_at: chrono::DateTime<chrono::Utc>,
    attributes: HashMap<String, serde_json::Value>,
    hub_connections: usize,
}

fn session_view(state: &AppState, session: &StoredSession) -> SessionView {
    SessionView {
        id: session.id().to_string(),
        variant: session.variant().to_string(),
        created_at: session.created_at(),
        attributes: session.base().attributes(),
        hub_connections: state.hub.connections_for(&session.id()),
    }
}

pub async fn current(
    State(state): State<AppState>,
    AnySession(session): AnySession,
) -> impl IntoResponse {
    Json(session_view(&state, &session))
}

pub async fn set_attribute(
    State(state): State<AppState>,
    Path(key): Path<String>,
    AnySession(session): AnySession,
    Json(value): Json<serde_json::Value>,
) -> impl IntoResponse {
    session.base().set_attribute(key, value);
    Json(session_view(&state, &session))
}

pub async fn remove_attribute(
    State(state): State<AppState>,
    Path(key): Path<String>,
    AnySession(session): AnySession,
) -> impl IntoResponse {
    session.base().remove_attribute(&key);
    Json(session_view(&state, &session))
}

#[derive(Serialize)]
pub struct SessionList {
    count: usize,
    sessions: Vec<SessionSummary>,
}

/// Most recently active first.
pub async fn list_sessions(State(state): State<AppState>) -> Result<Json<SessionList>, ApiError> {
    let mut sessions = state.sessions.list()?;
    sessions.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
    Ok(Json(SessionList {
        count: sessions.len(),
        sessions,
    }))
}
