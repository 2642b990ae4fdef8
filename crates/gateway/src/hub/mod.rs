//! Real-time tier: the legend hub.
//!
//! Each WebSocket connection binds its session once, at the handshake, and
//! keeps it for its whole lifetime.

pub mod protocol;
pub mod registry;
pub mod ws;

use std::sync::Arc;

use wi_sessions::{GribSession, LegendService, SessionKind, SessionModel};

use protocol::ServerMessage;
use registry::HubRegistry;

/// Push the session's current legend to every hub connection bound to it.
pub fn publish_legend(hub: &HubRegistry, session: &Arc<GribSession>) -> usize {
    let legend = LegendService::legend_for_session(&GribSession::into_stored(session.clone()));
    hub.broadcast_to_session(&session.id(), &ServerMessage::Legend { legend })
}
