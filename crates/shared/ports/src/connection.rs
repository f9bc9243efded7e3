use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::cookies::CookieSet;
use crate::error::TransportResult;
use crate::event::EventSource;
use crate::proxy::HubProxy;
use crate::state::{ConnectionState, StateChange};

/// Port for the persistent hub connection
///
/// Implementations report progress through `state_changed` while `start`
/// runs, and raise `closed` when an established connection drops.
#[async_trait]
pub trait HubConnection: Send + Sync {
    /// Begin connecting
    async fn start(&self) -> TransportResult<()>;

    /// Stop the connection, waiting at most `timeout`
    async fn stop(&self, timeout: Duration);

    /// Current transport state
    fn state(&self) -> ConnectionState;

    /// State-change notifications
    fn state_changed(&self) -> &EventSource<StateChange>;

    /// Raised when the connection closes
    fn closed(&self) -> &EventSource<()>;

    /// Create a proxy for the named hub
    fn create_hub_proxy(&self, hub_name: &str) -> TransportResult<Arc<dyn HubProxy>>;

    /// Install session cookies used by subsequent connect attempts
    fn set_cookies(&self, cookies: CookieSet);
}

/// Creates hub connections for a feed address
pub trait ConnectionFactory: Send + Sync {
    fn create(&self, address: &str) -> TransportResult<Arc<dyn HubConnection>>;
}
