use std::sync::Arc;

use wi_domain::config::Config;
use wi_sessions::{LegendService, SessionResolver, SessionStore};

use crate::hub::registry::HubRegistry;

/// Shared application state passed to all handlers.
///
/// Everything here is built once at startup and shared by every
/// per-request and per-connection scope, so each service is internally
/// synchronized.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    // ── Session management ────────────────────────────────────────────
    /// The process-wide session store.
    pub sessions: Arc<dyn SessionStore>,
    pub resolver: Arc<SessionResolver>,

    // ── Services ──────────────────────────────────────────────────────
    pub legends: Arc<LegendService>,
    /// Live hub connections (real-time tier).
    pub hub: Arc<HubRegistry>,
}
