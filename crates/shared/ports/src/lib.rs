//! DeltaStream Ports
//!
//! Port definitions (traits) for the collaborators the stream client drives.
//! These define the boundary between the orchestration engine and the
//! hub transport / anti-bot challenge implementations.

mod challenge;
mod connection;
mod cookies;
mod error;
mod event;
mod proxy;
mod state;

pub use challenge::ChallengeSolver;
pub use connection::{ConnectionFactory, HubConnection};
pub use cookies::CookieSet;
pub use error::{TransportError, TransportResult};
pub use event::{EventSource, HandlerId};
pub use proxy::{HubProxy, RawBatch};
pub use state::{ConnectionState, StateChange};
