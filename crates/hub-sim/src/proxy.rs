use async_trait::async_trait;
use deltastream_core::SummaryBatch;
use deltastream_ports::{EventSource, HubProxy, RawBatch, TransportError, TransportResult};
use log::{debug, error};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// One recorded server invocation
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub action: String,
    pub args: Vec<Value>,
}

/// Scripted hub proxy
///
/// Records invocations, and delivers batches pushed by the test to whatever
/// handlers are attached to the named event at the time of the push.
pub struct SimProxy {
    invocations: Mutex<Vec<Invocation>>,
    events: Mutex<HashMap<String, Arc<EventSource<RawBatch>>>>,
    failing: Mutex<HashMap<String, String>>,
    invoke_delay: Mutex<Option<Duration>>,
}

impl SimProxy {
    pub fn new() -> Self {
        Self {
            invocations: Mutex::new(Vec::new()),
            events: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashMap::new()),
            invoke_delay: Mutex::new(None),
        }
    }

    /// Make invocations of `action` fail with `reason`
    pub fn fail_action(&self, action: &str, reason: &str) {
        self.failing
            .lock()
            .insert(action.to_string(), reason.to_string());
    }

    /// Hold every invocation for `delay` after recording it, before answering
    pub fn set_invoke_delay(&self, delay: Option<Duration>) {
        *self.invoke_delay.lock() = delay;
    }

    pub fn clear_failures(&self) {
        self.failing.lock().clear();
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().clone()
    }

    pub fn invocation_count(&self, action: &str) -> usize {
        self.invocations
            .lock()
            .iter()
            .filter(|invocation| invocation.action == action)
            .count()
    }

    /// Number of handlers attached to `event_name`
    pub fn handler_count(&self, event_name: &str) -> usize {
        self.events
            .lock()
            .get(event_name)
            .map(|source| source.handler_count())
            .unwrap_or(0)
    }

    /// Emit raw event arguments on `event_name`
    pub fn push(&self, event_name: &str, batch: RawBatch) {
        let source = self.events.lock().get(event_name).cloned();
        match source {
            Some(source) => source.emit(&batch),
            None => debug!("No listeners for '{}', dropping batch", event_name),
        }
    }

    /// Emit a summary batch encoded as a JSON object
    pub fn push_summary(&self, event_name: &str, batch: &SummaryBatch) {
        match serde_json::to_value(batch) {
            Ok(value) => self.push(event_name, vec![value]),
            Err(e) => error!("Failed to encode summary batch: {}", e),
        }
    }

    /// Emit a batch whose single argument is the given text
    pub fn push_text(&self, event_name: &str, text: &str) {
        self.push(event_name, vec![Value::String(text.to_string())]);
    }
}

impl Default for SimProxy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HubProxy for SimProxy {
    async fn invoke(&self, action: &str, args: Vec<Value>) -> TransportResult<Value> {
        debug!("Invoke '{}' with {} args", action, args.len());
        self.invocations.lock().push(Invocation {
            action: action.to_string(),
            args,
        });

        let delay = *self.invoke_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(reason) = self.failing.lock().get(action) {
            return Err(TransportError::Invoke {
                action: action.to_string(),
                reason: reason.clone(),
            });
        }

        Ok(Value::Bool(true))
    }

    fn subscribe(&self, event_name: &str) -> Arc<EventSource<RawBatch>> {
        Arc::clone(
            self.events
                .lock()
                .entry(event_name.to_string())
                .or_insert_with(|| Arc::new(EventSource::new())),
        )
    }
}
