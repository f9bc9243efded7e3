use deltastream_core::SubscriptionId;
use deltastream_ports::TransportError;
use thiserror::Error;

/// Errors returned to subscribe callers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Challenge bypass for {address} returned no cookies")]
    ChallengeFailed { address: String },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Feed registration failed: {0}")]
    FeedRegistration(String),

    #[error("Client has been disposed")]
    Disposed,
}

/// Outcome of a subscribe call
pub type SubscribeResult = Result<SubscriptionId, StreamError>;
