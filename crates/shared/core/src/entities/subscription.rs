use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle returned by a successful subscribe call
///
/// Ids come from a per-client monotonic counter and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Which updates a subscription wants to receive
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketFilter {
    /// Exactly one market, compared case-sensitively
    Market(String),
    /// Every market on the feed
    All,
}

impl MarketFilter {
    /// Filter for a single market
    pub fn market(name: impl Into<String>) -> Self {
        Self::Market(name.into())
    }

    /// Check whether an update for `market_name` passes this filter
    pub fn matches(&self, market_name: &str) -> bool {
        match self {
            Self::Market(name) => name == market_name,
            Self::All => true,
        }
    }

    /// Check if this is the wildcard filter
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::All)
    }
}

impl fmt::Display for MarketFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Market(name) => f.write_str(name),
            Self::All => f.write_str("*"),
        }
    }
}
