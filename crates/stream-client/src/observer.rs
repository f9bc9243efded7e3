use deltastream_core::{DecodeError, SubscriptionId};
use log::warn;

/// Hook for dispatch problems that are never surfaced to callers
pub trait DispatchObserver: Send + Sync {
    /// An inbound batch was empty or could not be decoded; it was dropped
    fn on_malformed_payload(&self, error: &DecodeError);

    /// A callback panicked while handling an update for `market`
    fn on_callback_failure(&self, id: SubscriptionId, market: &str, reason: &str);
}

/// Default observer: reports through the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl DispatchObserver for LogObserver {
    fn on_malformed_payload(&self, error: &DecodeError) {
        warn!("Dropping summary batch: {}", error);
    }

    fn on_callback_failure(&self, id: SubscriptionId, market: &str, reason: &str) {
        warn!("Callback of {} failed on {}: {}", id, market, reason);
    }
}
