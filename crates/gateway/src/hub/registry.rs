//! In-memory registry of live hub connections.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc;

use wi_sessions::SessionToken;

use super::protocol::ServerMessage;

/// Channel to a connection's WebSocket writer task.
pub type HubSink = mpsc::Sender<ServerMessage>;

/// A live hub connection.
pub struct HubConnection {
    pub connection_id: String,
    pub session_id: SessionToken,
    pub connected_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub sink: HubSink,
}

/// Summary info returned by list endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct HubConnectionInfo {
    pub connection_id: String,
    pub session_id: SessionToken,
    pub connected_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Thread-safe registry of all hub connections.
pub struct HubRegistry {
    connections: RwLock<HashMap<String, HubConnection>>,
}

impl Default for HubRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HubRegistry {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, conn: HubConnection) {
        tracing::debug!(
            connection_id = %conn.connection_id,
            session_id = %conn.session_id,
            "hub connection registered"
        );
        self.connections
            .write()
            .insert(conn.connection_id.clone(), conn);
    }

    pub fn remove(&self, connection_id: &str) {
        if self.connections.write().remove(connection_id).is_some() {
            tracing::debug!(connection_id = %connection_id, "hub connection removed");
        }
    }

    /// Update the last_seen timestamp (called on any inbound message).
    pub fn touch(&self, connection_id: &str) {
        if let Some(conn) = self.connections.write().get_mut(connection_id) {
            conn.last_seen = Utc::now();
        }
    }

    /// Sessions with at least one live connection.
    pub fn bound_sessions(&self) -> HashSet<SessionToken> {
        self.connections
            .read()
            .values()
            .map(|c| c.session_id)
            .collect()
    }

    /// Push `msg` to every connection bound to `session_id`.  Returns the
    /// number of connections it was queued for.  Full or closed sinks are
    /// skipped rather than awaited.
    pub fn broadcast_to_session(&self, session_id: &SessionToken, msg: &ServerMessage) -> usize {
        let sinks: Vec<(String, HubSink)> = self
            .connections
            .read()
            .values()
            .filter(|c| &c.session_id == session_id)
            .map(|c| (c.connection_id.clone(), c.sink.clone()))
            .collect();

        let mut delivered = 0;
        for (connection_id, sink) in sinks {
            match sink.try_send(msg.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::debug!(connection_id = %connection_id, error = %e, "hub push dropped")
                }
            }
        }
        delivered
    }

    pub fn connections_for(&self, session_id: &SessionToken) -> usize {
        self.connections
            .read()
            .values()
            .filter(|c| &c.session_id == session_id)
            .count()
    }

    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }

    pub fn list(&self) -> Vec<HubConnectionInfo> {
        self.connections
            .read()
            .values()
            .map(|c| HubConnectionInfo {
                connection_id: c.connection_id.clone(),
                session_id: c.session_id,
                connected_at: c.connected_at,
                last_seen: c.last_seen,
            })
            .collect()
    }
}
