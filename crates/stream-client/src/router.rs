use deltastream_core::{MarketUpdate, SummaryBatch};
use log::debug;
use serde_json::Value;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::observer::DispatchObserver;
use crate::registry::SubscriptionRegistry;

/// Decodes inbound batches and fans each update out to matching subscriptions
pub struct MessageRouter {
    registry: Arc<SubscriptionRegistry>,
    observer: Arc<dyn DispatchObserver>,
}

impl MessageRouter {
    pub fn new(registry: Arc<SubscriptionRegistry>, observer: Arc<dyn DispatchObserver>) -> Self {
        Self { registry, observer }
    }

    /// Handle the arguments of one feed event
    ///
    /// Runs on the transport's notification thread. Nothing here is allowed to
    /// propagate back into the transport: bad payloads and failing callbacks
    /// only reach the observer.
    pub fn on_raw_batch(&self, args: &[Value]) {
        let batch = match SummaryBatch::decode(args) {
            Ok(batch) => batch,
            Err(e) => {
                self.observer.on_malformed_payload(&e);
                return;
            }
        };

        debug!(
            "Dispatching batch {:?} with {} updates",
            batch.nonce,
            batch.len()
        );
        for update in &batch.deltas {
            self.dispatch(update);
        }
    }

    fn dispatch(&self, update: &MarketUpdate) {
        // Fresh snapshot per update so removals made by earlier callbacks apply
        for subscription in self.registry.matching(update.market()) {
            let callback = &subscription.callback;
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(update))) {
                self.observer.on_callback_failure(
                    subscription.id,
                    update.market(),
                    &panic_reason(payload.as_ref()),
                );
            }
        }
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "callback panicked".to_string()
    }
}
