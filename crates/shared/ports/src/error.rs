use thiserror::Error;

/// Errors raised by transport collaborators
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Remote invocation of '{action}' failed: {reason}")]
    Invoke { action: String, reason: String },

    #[error("Hub proxy unavailable: {0}")]
    Proxy(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

pub type TransportResult<T> = std::result::Result<T, TransportError>;
