//! Hub Simulator
//!
//! In-memory implementations of the DeltaStream collaborator ports, for tests
//! and local runs without a live feed.
//!
//! - [`SimConnection`]: hub connection whose connect outcome is scripted
//!   ([`ConnectBehavior`]) and which can drop unexpectedly on demand
//! - [`SimProxy`]: records every invocation and lets the test push batches
//! - [`SimConnectionFactory`]: hands out one shared connection
//! - [`ScriptedSolver`]: challenge solver with a canned answer and a call log
//!
//! ## Usage
//!
//! ```ignore
//! let factory = SimConnectionFactory::new(ConnectBehavior::RequireCookies);
//! let solver = ScriptedSolver::granting(CookieSet::new().with("cf_clearance", "ok"));
//! let client = SummaryStreamClient::with_collaborators(config, Arc::new(factory.clone()), Arc::new(solver));
//! factory.connection().proxy().push_summary("updateSummaryState", &batch);
//! ```

mod challenge;
mod connection;
mod factory;
mod proxy;

pub use challenge::{ScriptedSolver, SolverCall};
pub use connection::{ConnectBehavior, SimConnection};
pub use factory::SimConnectionFactory;
pub use proxy::{Invocation, SimProxy};
