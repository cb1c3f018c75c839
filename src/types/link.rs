//! Connection state of the gateway link

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of the stream connection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    /// Never connected, or explicitly disconnected
    #[default]
    Idle,
    /// Handshake in progress
    Connecting,
    /// Stream open, frames flowing
    Open,
    /// Transport lost; a reconnect may be pending
    Closed,
}

impl LinkState {
    /// `connect()` is a no-op in these states.
    pub fn is_active(self) -> bool {
        matches!(self, LinkState::Connecting | LinkState::Open)
    }
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkState::Idle => write!(f, "IDLE"),
            LinkState::Connecting => write!(f, "CONNECTING"),
            LinkState::Open => write!(f, "OPEN"),
            LinkState::Closed => write!(f, "CLOSED"),
        }
    }
}

/// Connection health as seen by consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    /// True only while the stream is open
    pub connected: bool,
    /// Receipt time of the last decoded frame
    pub last_update: Option<DateTime<Utc>>,
    /// PLC connections reported by the gateway status endpoint
    pub plc_connections: u32,
    /// Stream clients reported by the gateway status endpoint
    pub websocket_clients: u32,
    pub link: LinkState,
    /// Automatic reconnects attempted since the last successful open
    pub reconnect_attempts: u32,
    /// Set once the client has given up reconnecting
    pub retries_exhausted: bool,
}

/// Counters returned by the gateway status endpoint.
///
/// Only the two fields consumed here are typed; the rest of the payload is
/// ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayHealth {
    #[serde(default)]
    pub plc_connections: u32,
    #[serde(default)]
    pub websocket_clients: u32,
}
