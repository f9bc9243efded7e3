//! DeltaStream Client
//!
//! Subscription and connection orchestration for the market summary feed.
//!
//! ## Architecture
//!
//! ```text
//! subscribe ──► SubscriptionRegistry ──► ConnectionManager ──► HubConnection
//!                      ▲                     (bypass, reconnect)     │
//!                      │                                             ▼
//!   callbacks ◄── MessageRouter ◄──────── feed event ◄────────── HubProxy
//! ```
//!
//! One hub connection is shared by every subscription of a client. The remote
//! feed registration is issued once while at least one subscription exists,
//! and re-issued after every reconnect.
//!
//! ## Usage
//!
//! ```ignore
//! let client = SummaryStreamClient::with_collaborators(StreamConfig::default(), factory, solver);
//! let id = client
//!     .subscribe_to_market("BTC-ETH", |update| println!("{} {}", update.market(), update.last))
//!     .await?;
//! client.unsubscribe(id).await;
//! ```

mod client;
pub mod config;
mod connection;
mod error;
mod observer;
mod registry;
mod router;
mod supervisor;

pub use client::SummaryStreamClient;
pub use config::{ConfigError, StreamConfig};
pub use error::{StreamError, SubscribeResult};
pub use observer::{DispatchObserver, LogObserver};
pub use registry::{Subscription, UpdateCallback};
