//! AppState construction and background-task spawning extracted from `main.rs`.

use std::sync::Arc;
use std::time::Duration;

use wi_domain::config::{Config, ConfigSeverity};
use wi_domain::trace::TraceEvent;
use wi_sessions::{
    CookieSettings, LegendService, MemorySessionStore, SessionResolver, SessionStore, SessionToken,
};

use crate::hub::registry::HubRegistry;
use crate::state::AppState;

/// Validate config, build the process-wide singletons and return a
/// fully-wired [`AppState`].
pub fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Session store + resolver ─────────────────────────────────────
    let cookie_name = config.sessions.effective_cookie_name();
    if !wi_domain::config::is_valid_cookie_name(&cookie_name) {
        anyhow::bail!(
            "{} holds an invalid cookie name: {cookie_name:?}",
            config.sessions.cookie_name_env
        );
    }
    let sessions: Arc<dyn SessionStore> =
        Arc::new(MemorySessionStore::with_capacity(config.sessions.max_sessions));
    let resolver = Arc::new(SessionResolver::new(
        sessions.clone(),
        CookieSettings::new(cookie_name.clone()),
        config.sessions.default_variant,
    ));
    tracing::info!(
        cookie = %cookie_name,
        default_variant = %config.sessions.default_variant,
        idle_ttl_secs = ?config.sessions.idle_ttl_secs,
        max_sessions = ?config.sessions.max_sessions,
        "session management ready"
    );

    // ── Singleton services ───────────────────────────────────────────
    let legends = Arc::new(LegendService::new(sessions.clone()));
    let hub = Arc::new(HubRegistry::new());

    Ok(AppState {
        config,
        sessions,
        resolver,
        legends,
        hub,
    })
}

/// Spawn the long-running background tokio tasks (idle session sweeper).
///
/// Call this **after** [`build_app_state`] when running the HTTP server.
pub fn spawn_background_tasks(state: &AppState) {
    // ── Periodic idle-session sweep ──────────────────────────────────
    if let Some(ttl) = state.config.sessions.idle_ttl_secs {
        let sessions = state.sessions.clone();
        let hub = state.hub.clone();
        let every = Duration::from_secs(state.config.sessions.sweep_interval_secs);
        let max_idle = Duration::from_secs(ttl);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                match sweep_idle(sessions.as_ref(), &hub, max_idle) {
                    Ok(_) => {}
                    Err(wi_domain::Error::StoreUnavailable(_)) => {
                        tracing::debug!("session store closed, stopping idle sweeper");
                        break;
                    }
                    Err(e) => tracing::warn!(error = %e, "idle session sweep failed"),
                }
            }
        });
        tracing::info!(ttl_secs = ttl, "idle session sweeper spawned");
    } else {
        tracing::info!("idle session expiry disabled (no sessions.idle_ttl_secs in config)");
    }
}

/// One sweep: evict idle sessions and report what happened.
///
/// Sessions bound to a live hub connection are never evicted; the
/// connection holds them for its whole lifetime.
pub fn sweep_idle(
    sessions: &dyn SessionStore,
    hub: &HubRegistry,
    max_idle: Duration,
) -> wi_domain::Result<usize> {
    let bound = hub.bound_sessions();
    let removed = sessions.prune_idle(max_idle, &|token: &SessionToken| bound.contains(token))?;
    if removed > 0 {
        TraceEvent::SessionsPruned {
            removed,
            remaining: sessions.len()?,
        }
        .emit();
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wi_sessions::StoredSession;

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(build_app_state(Arc::new(config)).is_err());
    }

    #[test]
    fn state_shares_one_store() {
        let state = build_app_state(Arc::new(Config::default())).unwrap();
        let s = StoredSession::create(wi_domain::SessionVariant::Base, SessionToken::generate());
        state.sessions.set(s.clone()).unwrap();
        assert!(state.resolver.store().contains(&s.id()).unwrap());
        assert_eq!(state.resolver.cookie_name(), "sid");
    }

    #[test]
    fn sweep_removes_idle_sessions() {
        let store = MemorySessionStore::new();
        store
            .set(StoredSession::create(wi_domain::SessionVariant::Grib, SessionToken::generate()))
            .unwrap();
        let hub = HubRegistry::new();
        assert_eq!(sweep_idle(&store, &hub, Duration::from_secs(60)).unwrap(), 0);
        assert_eq!(sweep_idle(&store, &hub, Duration::ZERO).unwrap(), 1);
    }
}
