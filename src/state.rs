use std::fmt;

use crate::error::ErrorKind;

/// Connection lifecycle. There is no automatic reconnection: once the
/// session falls back to `Disconnected`, a fresh `connect` must be requested
/// by the collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session. Initial and terminal state.
    Disconnected,
    /// The connect handshake is in progress.
    Connecting,
    /// The backpack is reachable but the camera is not powered on and ready.
    Connected,
    /// The camera is powered on and accepting commands. The status poller
    /// runs only in this state.
    Ready,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Ready => "ready",
        };
        f.write_str(s)
    }
}

/// Immutable view of the live connection, published over a watch channel
/// whenever anything changes. Collaborators read it through
/// [`CameraClient`](crate::CameraClient) accessors; they never see the
/// task's mutable state directly.
#[derive(Debug, Clone)]
pub struct ConnectionSnapshot {
    pub state: ConnectionState,
    /// Network address of the camera (e.g. `10.5.5.9`).
    pub address: String,
    /// WiFi network name the backpack reported during the handshake.
    pub name: Option<String>,
    /// Power state as last reported by the backpack.
    pub power_on: bool,
    /// Human-readable model name, known once the session became ready.
    pub model: Option<String>,
    /// Firmware version, known once the session became ready.
    pub firmware: Option<String>,
    /// Kind of the error that ended the previous session, if any.
    pub last_error: Option<ErrorKind>,
}

impl ConnectionSnapshot {
    pub fn new(address: String) -> Self {
        ConnectionSnapshot {
            state: ConnectionState::Disconnected,
            address,
            name: None,
            power_on: false,
            model: None,
            firmware: None,
            last_error: None,
        }
    }
}
