use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for one [`SummaryStreamClient`](crate::SummaryStreamClient)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Feed address, also handed to the challenge solver
    #[serde(default = "default_address")]
    pub address: String,

    #[serde(default = "default_hub_name")]
    pub hub_name: String,

    /// Server action that registers this connection for summary deltas
    #[serde(default = "default_feed_action")]
    pub feed_action: String,

    /// Event carrying the summary batches
    #[serde(default = "default_feed_event")]
    pub feed_event: String,

    /// User agent presented to the anti-bot front end
    #[serde(default = "default_bypass_identity")]
    pub bypass_identity: String,

    #[serde(default = "default_bypass_timeout")]
    pub bypass_timeout_secs: u64,

    /// How long to wait for a connect attempt to settle
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_close_timeout")]
    pub close_timeout_ms: u64,

    /// Base delay between reconnect attempts
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,

    #[serde(default = "default_max_reconnect_delay")]
    pub max_reconnect_delay_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            hub_name: default_hub_name(),
            feed_action: default_feed_action(),
            feed_event: default_feed_event(),
            bypass_identity: default_bypass_identity(),
            bypass_timeout_secs: default_bypass_timeout(),
            connect_timeout_ms: default_connect_timeout(),
            close_timeout_ms: default_close_timeout(),
            reconnect_delay_ms: default_reconnect_delay(),
            max_reconnect_delay_ms: default_max_reconnect_delay(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl StreamConfig {
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn with_hub_name(mut self, hub_name: impl Into<String>) -> Self {
        self.hub_name = hub_name.into();
        self
    }

    /// Set the registration action and the event it enables
    pub fn with_feed(mut self, action: impl Into<String>, event: impl Into<String>) -> Self {
        self.feed_action = action.into();
        self.feed_event = event.into();
        self
    }

    pub fn with_bypass(mut self, identity: impl Into<String>, timeout_secs: u64) -> Self {
        self.bypass_identity = identity.into();
        self.bypass_timeout_secs = timeout_secs;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = millis(timeout);
        self
    }

    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout_ms = millis(timeout);
        self
    }

    pub fn with_reconnect_backoff(mut self, delay: Duration, max: Duration, multiplier: f64) -> Self {
        self.reconnect_delay_ms = millis(delay);
        self.max_reconnect_delay_ms = millis(max);
        self.backoff_multiplier = multiplier;
        self
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    #[must_use]
    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }

    /// Wait before reconnect attempt `attempt` (0-based)
    ///
    /// The first attempt runs immediately; attempt `n` waits
    /// `reconnect_delay * multiplier^(n-1)`, capped at `max_reconnect_delay`.
    #[must_use]
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let delay = self.reconnect_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        let capped = delay.min(self.max_reconnect_delay_ms as f64) as u64;
        Duration::from_millis(capped)
    }
}

/// Whole milliseconds, saturating at `u64::MAX`
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn default_address() -> String {
    "https://socket.bittrex.com/".to_string()
}

fn default_hub_name() -> String {
    "coreHub".to_string()
}

fn default_feed_action() -> String {
    "SubscribeToSummaryDeltas".to_string()
}

fn default_feed_event() -> String {
    "updateSummaryState".to_string()
}

fn default_bypass_identity() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/63.0.3239.132 Safari/537.36".to_string()
}

fn default_bypass_timeout() -> u64 {
    10
}

fn default_connect_timeout() -> u64 {
    10_000
}

fn default_close_timeout() -> u64 {
    5_000
}

fn default_reconnect_delay() -> u64 {
    500
}

fn default_max_reconnect_delay() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}
