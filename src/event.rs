use crate::error::ErrorKind;
use crate::status::{CameraStatus, StatusDelta};

/// Notifications delivered to the collaborator, in emission order.
///
/// Ordering guarantees: `Connected` precedes `Ready` or `Error` for the same
/// connect attempt; `Ready` precedes the first `StatusChanged`; no
/// `StatusChanged` is emitted after the session is torn down.
#[derive(Debug, Clone)]
pub enum CameraEvent {
    /// The connect handshake succeeded. Carries the WiFi name the backpack
    /// reported.
    Connected { name: String },

    /// The camera is powered on and accepting commands. Emitted at most
    /// once per connect/power-on sequence.
    Ready,

    /// Connect failed (`NotFound`) or the established link was lost
    /// (`Disconnected`). Not emitted for an explicitly requested disconnect.
    Error(ErrorKind),

    /// A new status snapshot replaced the previous one.
    ///
    /// `delta` lists only the keys that changed; for the first snapshot
    /// after `Ready` it lists every key with no previous value, so
    /// incremental UIs can tell "populate" from "update".
    StatusChanged {
        status: CameraStatus,
        delta: StatusDelta,
    },
}
