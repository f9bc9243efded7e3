use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::error::TransportResult;
use crate::event::EventSource;

/// Arguments of one hub event emission, exactly as received
pub type RawBatch = Vec<Value>;

/// Port for a remote hub: invoke server actions and receive named events
#[async_trait]
pub trait HubProxy: Send + Sync {
    /// Invoke a server-side action
    async fn invoke(&self, action: &str, args: Vec<Value>) -> TransportResult<Value>;

    /// Get the event stream for `event_name`
    ///
    /// Repeated calls for the same name return the same source.
    fn subscribe(&self, event_name: &str) -> Arc<EventSource<RawBatch>>;
}
