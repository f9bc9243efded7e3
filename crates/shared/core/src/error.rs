use thiserror::Error;

/// Why an inbound payload could not be turned into a [`SummaryBatch`](crate::SummaryBatch)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Empty payload")]
    Empty,

    #[error("Payload is not valid JSON: {0}")]
    NotJson(String),

    #[error("Unexpected payload shape: {0}")]
    Shape(String),
}
