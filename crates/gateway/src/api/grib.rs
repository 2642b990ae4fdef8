//! GRIB viewer API endpoints (GRIB session variant).
//!
//! - `GET /api/grib/view`    the caller's viewer state
//! - `PUT /api/grib/view`    update layers / legend visibility; pushes the
//!   new legend to the caller's hub connections
//! - `GET /api/grib/legend`  the caller's legend
//! - `GET /api/grib/layers`  layer catalogue (no session bound)

use axum::extract::State;
use axum::response::{IntoResponse, Json};
use serde::{Deserialize, Serialize};

use wi_sessions::legend::{self, LayerSpec};
use wi_sessions::{GribSession, GribView, Legend, SessionModel};

use crate::binder::Session;
use crate::error::ApiError;
use crate::state::AppState;

pub async fn get_view(Session(session): Session<GribSession>) -> Json<GribView> {
    Json(session.view())
}

#[derive(Debug, Deserialize)]
pub struct UpdateViewBody {
    #[serde(default)]
    pub layers: Option<Vec<String>>,
    #[serde(default)]
    pub legend_visible: Option<bool>,
}

#[derive(Serialize)]
pub struct UpdateViewResponse {
    view: GribView,
    /// Hub connections the new legend was pushed to.
    pushed: usize,
}

pub async fn update_view(
    State(state): State<AppState>,
    Session(session): Session<GribSession>,
    Json(body): Json<UpdateViewBody>,
) -> Result<Json<UpdateViewResponse>, ApiError> {
    if let Some(layers) = &body.layers {
        let unknown = legend::unknown_layers(layers);
        if !unknown.is_empty() {
            return Err(ApiError::BadRequest(format!(
                "unknown layers: {}",
                unknown.join(", ")
            )));
        }
    }

    if let Some(layers) = body.layers {
        session.select_layers(layers);
    }
    if let Some(visible) = body.legend_visible {
        session.set_legend_visible(visible);
    }

    let pushed = crate::hub::publish_legend(&state.hub, &session);
    tracing::debug!(session_id = %session.id(), pushed, "grib view updated");

    Ok(Json(UpdateViewResponse {
        view: session.view(),
        pushed,
    }))
}

pub async fn get_legend(
    State(state): State<AppState>,
    Session(session): Session<GribSession>,
) -> Result<Json<Legend>, ApiError> {
    Ok(Json(state.legends.legend_for(&session.id())?))
}

pub async fn list_layers() -> impl IntoResponse {
    let layers: &'static [LayerSpec] = legend::layers();
    Json(serde_json::json!({
        "layers": layers,
        "count": layers.len(),
    }))
}
