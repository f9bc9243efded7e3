use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::market_update::MarketUpdate;
use crate::error::DecodeError;

/// One inbound push from the summary feed
///
/// A batch carries the updates of every market that changed since the
/// previous push, in the order the server listed them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SummaryBatch {
    /// Server sequence number (spelled `Nounce` by the feed)
    #[serde(rename = "Nounce", alias = "Nonce", default)]
    pub nonce: Option<u64>,
    #[serde(rename = "Deltas")]
    pub deltas: Vec<MarketUpdate>,
}

impl SummaryBatch {
    pub fn new(deltas: Vec<MarketUpdate>) -> Self {
        Self {
            nonce: None,
            deltas,
        }
    }

    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    /// Decode the arguments of one feed event
    ///
    /// The batch is the first argument, either as a JSON object or as a string
    /// holding the JSON text. Remaining arguments are ignored.
    pub fn decode(args: &[Value]) -> Result<Self, DecodeError> {
        let first = args.first().ok_or(DecodeError::Empty)?;
        match first {
            Value::Null => Err(DecodeError::Empty),
            Value::String(text) if text.trim().is_empty() => Err(DecodeError::Empty),
            Value::String(text) => {
                serde_json::from_str(text).map_err(|e| DecodeError::NotJson(e.to_string()))
            }
            Value::Object(_) => Self::deserialize(first)
                .map_err(|e| DecodeError::Shape(e.to_string())),
            other => Err(DecodeError::Shape(format!(
                "expected an object, got {}",
                kind(other)
            ))),
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
