use std::fmt;

use thiserror::Error;

use crate::state::ConnectionState;

/// Typed failures surfaced across the client boundary.
#[derive(Debug, Clone, Error)]
pub enum CameraError {
    /// The connect handshake could not reach a camera. Recoverable by
    /// retrying `connect`.
    #[error("no camera found at {address}")]
    NotFound { address: String },

    /// The link was lost after being established. Fatal to the current
    /// connection; a fresh connect is required.
    #[error("camera connection lost")]
    Disconnected,

    /// The device (or the option translator) refused this particular
    /// command. Local to the command; the connection stays alive.
    #[error("camera rejected command: {reason}")]
    Rejected { reason: String },

    /// The command is not valid in the current connection state. The
    /// connection stays alive and no request is sent.
    #[error("cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: ConnectionState,
    },

    /// The command slot is already occupied by another request. The caller
    /// may retry shortly.
    #[error("camera is busy with another request")]
    Busy,
}

impl CameraError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CameraError::NotFound { .. } => ErrorKind::NotFound,
            CameraError::Disconnected => ErrorKind::Disconnected,
            CameraError::Rejected { .. } => ErrorKind::Rejected,
            CameraError::InvalidState { .. } => ErrorKind::InvalidState,
            CameraError::Busy => ErrorKind::Busy,
        }
    }
}

/// Coarse error category, as delivered in [`CameraEvent::Error`]
/// (crate::CameraEvent::Error). The display form matches what UI layers
/// historically switched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Disconnected,
    Rejected,
    InvalidState,
    Busy,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Disconnected => "Disconnected",
            ErrorKind::Rejected => "Rejected",
            ErrorKind::InvalidState => "InvalidState",
            ErrorKind::Busy => "Busy",
        };
        f.write_str(s)
    }
}
