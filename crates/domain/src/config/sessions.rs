use serde::{Deserialize, Serialize};

use crate::variant::SessionVariant;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sessions & session cookie
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Session cookie and store lifecycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Name of the cookie carrying the session token.
    #[serde(default = "d_cookie_name")]
    pub cookie_name: String,

    /// Environment variable that, when set and non-empty, overrides
    /// `cookie_name`.
    #[serde(default = "d_cookie_name_env")]
    pub cookie_name_env: String,

    /// Variant created by consumers that only need the base identity
    /// capability (`resolve_any`).
    #[serde(default)]
    pub default_variant: SessionVariant,

    /// Evict sessions not accessed for this many seconds.  `None` keeps
    /// every session for the lifetime of the process.
    #[serde(default)]
    pub idle_ttl_secs: Option<u64>,

    /// Upper bound on live sessions.  When reached, creating a session
    /// evicts the least recently accessed one.
    #[serde(default)]
    pub max_sessions: Option<usize>,

    /// How often the idle sweeper runs (only when `idle_ttl_secs` is set).
    #[serde(default = "d_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            cookie_name: d_cookie_name(),
            cookie_name_env: d_cookie_name_env(),
            default_variant: SessionVariant::default(),
            idle_ttl_secs: None,
            max_sessions: None,
            sweep_interval_secs: d_sweep_interval(),
        }
    }
}

impl SessionsConfig {
    /// The effective cookie name: the env override when set and non-empty,
    /// otherwise `cookie_name`.
    pub fn effective_cookie_name(&self) -> String {
        match std::env::var(&self.cookie_name_env) {
            Ok(v) if !v.trim().is_empty() => v.trim().to_owned(),
            _ => self.cookie_name.clone(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_cookie_name() -> String {
    "sid".into()
}
fn d_cookie_name_env() -> String {
    "WI_SESSION_COOKIE".into()
}
fn d_sweep_interval() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_uses_defaults() {
        let cfg: SessionsConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.cookie_name, "sid");
        assert_eq!(cfg.cookie_name_env, "WI_SESSION_COOKIE");
        assert_eq!(cfg.default_variant, SessionVariant::Grib);
        assert!(cfg.idle_ttl_secs.is_none());
        assert!(cfg.max_sessions.is_none());
        assert_eq!(cfg.sweep_interval_secs, 60);
    }

    #[test]
    fn parses_lifecycle_fields() {
        let toml_str = r#"
            cookie_name = "webioc_sid"
            default_variant = "base"
            idle_ttl_secs = 1800
            max_sessions = 10000
        "#;
        let cfg: SessionsConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.cookie_name, "webioc_sid");
        assert_eq!(cfg.default_variant, SessionVariant::Base);
        assert_eq!(cfg.idle_ttl_secs, Some(1800));
        assert_eq!(cfg.max_sessions, Some(10_000));
    }

    #[test]
    fn env_override_wins_when_set() {
        let cfg = SessionsConfig {
            cookie_name_env: "WI_TEST_COOKIE_OVERRIDE_SET".into(),
            ..Default::default()
        };
        std::env::set_var("WI_TEST_COOKIE_OVERRIDE_SET", "other_sid");
        assert_eq!(cfg.effective_cookie_name(), "other_sid");
        std::env::remove_var("WI_TEST_COOKIE_OVERRIDE_SET");
    }

    #[test]
    fn empty_env_override_ignored() {
        let cfg = SessionsConfig {
            cookie_name_env: "WI_TEST_COOKIE_OVERRIDE_EMPTY".into(),
            ..Default::default()
        };
        std::env::set_var("WI_TEST_COOKIE_OVERRIDE_EMPTY", "  ");
        assert_eq!(cfg.effective_cookie_name(), "sid");
        std::env::remove_var("WI_TEST_COOKIE_OVERRIDE_EMPTY");
    }
}
