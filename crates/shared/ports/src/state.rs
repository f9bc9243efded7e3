use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection lifecycle state
///
/// Transports only ever report the first three; `Reconnecting` is set by the
/// stream client while it restores a connection that dropped unexpectedly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// A connect attempt has finished once the state is no longer transitional
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Connected | Self::Disconnected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Reconnecting => write!(f, "Reconnecting"),
        }
    }
}

/// Payload of the transport's state-change notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub old: ConnectionState,
    pub new: ConnectionState,
}

impl StateChange {
    pub fn new(old: ConnectionState, new: ConnectionState) -> Self {
        Self { old, new }
    }
}
