//! Hub wire messages (JSON, tagged by `type`).

use serde::{Deserialize, Serialize};

use wi_sessions::Legend;

/// Client → server.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Replace the selected weather layers.
    SelectLayers { layers: Vec<String> },
    /// Show or hide the legend panel.
    SetLegendVisible { visible: bool },
    /// Ask for the current legend.
    GetLegend,
    Ping { timestamp: i64 },
}

/// Server → client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// First message on every connection.
    Welcome {
        session_id: String,
        connection_id: String,
        server_version: String,
    },
    /// Current legend; pushed to every connection of the session when the
    /// view changes.
    Legend { legend: Legend },
    Pong { timestamp: i64 },
    Error { message: String },
}
