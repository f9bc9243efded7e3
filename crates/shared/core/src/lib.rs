//! DeltaStream Core Domain
//!
//! Pure domain types for the market summary feed.
//! This crate contains no async, no I/O, and is 100% unit testable.

pub mod entities;
pub mod error;
pub mod values;

// Re-export commonly used types at crate root
pub use entities::{MarketFilter, MarketUpdate, SubscriptionId, SummaryBatch};
pub use error::DecodeError;
pub use values::{MarketName, Price, Timestamp, Volume};
