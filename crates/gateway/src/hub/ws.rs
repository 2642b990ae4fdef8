//! WebSocket endpoint for the legend hub.
//!
//! Flow:
//! 1. Client connects to `/hub`, sending its session cookie with the
//!    handshake.  The session is resolved (or created) once, here; a new
//!    session's cookie rides on the `101 Switching Protocols` response.
//! 2. Server sends `welcome` followed by the current `legend`.
//! 3. Message loop: `select_layers` / `set_legend_visible` update the
//!    session and push the new legend to every connection of that session;
//!    `get_legend` and `ping` are answered on this connection only.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::{HeaderMap, Uri};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use wi_domain::trace::TraceEvent;
use wi_sessions::legend;
use wi_sessions::{GribSession, LegendService, SessionKind, SessionModel};

use super::protocol::{ClientMessage, ServerMessage};
use super::registry::HubConnection;
use crate::binder;
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handler
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// GET /hub: upgrade to WebSocket.
pub async fn hub_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let resolution = match binder::resolve_handshake::<GribSession>(&state, &uri, &headers) {
        Ok(r) => r,
        Err(e) => return e.into_response(),
    };

    let session = resolution.session;
    let mut response = ws
        .on_upgrade(move |socket| handle_socket(socket, state, session))
        .into_response();
    if let Some(cookie) = &resolution.set_cookie {
        binder::apply_cookie(response.headers_mut(), cookie);
    }
    response
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Socket handler
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn handle_socket(socket: WebSocket, state: AppState, session: Arc<GribSession>) {
    let (mut ws_sink, mut ws_stream) = socket.split();
    let connection_id = uuid::Uuid::new_v4().to_string();
    let session_id = session.id();

    // Outbound messages from any task → this connection's writer.
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<ServerMessage>(64);

    // Registered before the greeting: pushes that race it queue in the
    // channel and reach the client after `welcome` and `legend`.
    state.hub.register(HubConnection {
        connection_id: connection_id.clone(),
        session_id,
        connected_at: Utc::now(),
        last_seen: Utc::now(),
        sink: outbound_tx.clone(),
    });
    TraceEvent::ConnectionBound {
        connection_id: connection_id.clone(),
        session_id: session_id.to_string(),
    }
    .emit();

    let welcome = ServerMessage::Welcome {
        session_id: session_id.to_string(),
        connection_id: connection_id.clone(),
        server_version: env!("CARGO_PKG_VERSION").to_string(),
    };
    let legend = ServerMessage::Legend {
        legend: legend_of(&session),
    };
    for msg in [welcome, legend] {
        if send_ws_message(&mut ws_sink, &msg).await.is_err() {
            tracing::warn!(connection_id = %connection_id, "failed to send hub greeting");
            state.hub.remove(&connection_id);
            return;
        }
    }

    // Writer task: forwards outbound channel messages to the WS sink.
    let writer = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            if send_ws_message(&mut ws_sink, &msg).await.is_err() {
                break;
            }
        }
    });

    // Reader loop.
    let mut messages: u64 = 0;
    while let Some(Ok(msg)) = ws_stream.next().await {
        match msg {
            Message::Text(text) => {
                messages += 1;
                state.hub.touch(&connection_id);
                keep_alive(&state, &session);
                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(client_msg) => {
                        handle_inbound(&state, &session, &outbound_tx, client_msg).await;
                    }
                    Err(e) => {
                        tracing::debug!(connection_id = %connection_id, error = %e, "unparseable hub message");
                        let _ = outbound_tx
                            .send(ServerMessage::Error {
                                message: format!("unrecognized message: {e}"),
                            })
                            .await;
                    }
                }
            }
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => {
                // axum answers WS-level pings automatically.
                state.hub.touch(&connection_id);
            }
            _ => {}
        }
    }

    state.hub.remove(&connection_id);
    writer.abort();
    TraceEvent::ConnectionClosed {
        connection_id,
        session_id: session_id.to_string(),
        messages,
    }
    .emit();
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn handle_inbound(
    state: &AppState,
    session: &Arc<GribSession>,
    reply: &mpsc::Sender<ServerMessage>,
    msg: ClientMessage,
) {
    match msg {
        ClientMessage::SelectLayers { layers } => {
            let unknown = legend::unknown_layers(&layers);
            if !unknown.is_empty() {
                let _ = reply
                    .send(ServerMessage::Error {
                        message: format!("unknown layers: {}", unknown.join(", ")),
                    })
                    .await;
                return;
            }
            session.select_layers(layers);
            super::publish_legend(&state.hub, session);
        }
        ClientMessage::SetLegendVisible { visible } => {
            session.set_legend_visible(visible);
            super::publish_legend(&state.hub, session);
        }
        ClientMessage::GetLegend => {
            let _ = reply
                .send(ServerMessage::Legend {
                    legend: legend_of(session),
                })
                .await;
        }
        ClientMessage::Ping { timestamp } => {
            let _ = reply.send(ServerMessage::Pong { timestamp }).await;
        }
    }
}

/// A connection never re-resolves its session, so it keeps the store entry
/// fresh (and restores it if idle expiry already removed it) whenever the
/// client is active.
fn keep_alive(state: &AppState, session: &Arc<GribSession>) {
    if let Err(e) = state
        .sessions
        .get_or_insert(GribSession::into_stored(session.clone()))
    {
        tracing::debug!(session_id = %session.id(), error = %e, "hub keep-alive failed");
    }
}

fn legend_of(session: &Arc<GribSession>) -> wi_sessions::Legend {
    LegendService::legend_for_session(&GribSession::into_stored(session.clone()))
}

async fn send_ws_message(
    sink: &mut (impl SinkExt<Message> + Unpin),
    msg: &ServerMessage,
) -> Result<(), ()> {
    let json = serde_json::to_string(msg).map_err(|_| ())?;
    sink.send(Message::Text(json)).await.map_err(|_| ())
}
