use serde::Serialize;

use crate::variant::SessionVariant;

/// Structured trace events emitted across all webioc crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionCreated {
        session_id: String,
        variant: SessionVariant,
        /// True when the client presented a well-formed token the store
        /// did not know (stale cookie from a previous process).
        replaced_unknown: bool,
    },
    SessionResolved {
        session_id: String,
        variant: SessionVariant,
        is_new: bool,
    },
    VariantMismatch {
        session_id: String,
        expected: SessionVariant,
        found: SessionVariant,
    },
    SessionsPruned {
        removed: usize,
        remaining: usize,
    },
    ConnectionBound {
        connection_id: String,
        session_id: String,
    },
    ConnectionClosed {
        connection_id: String,
        session_id: String,
        messages: u64,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "wi_event");
    }
}
