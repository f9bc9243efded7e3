//! Subscription registry
//!
//! Owns the logical subscriptions and the flag guarding the single remote
//! feed registration. Every mutation happens under one lock, and lookups
//! hand out snapshots so callbacks can subscribe or unsubscribe while a
//! batch is being dispatched.

use chrono::{DateTime, Utc};
use deltastream_core::{MarketFilter, MarketUpdate, SubscriptionId};
use log::debug;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Callback invoked with every update matching a subscription
pub type UpdateCallback = Arc<dyn Fn(&MarketUpdate) + Send + Sync>;

#[derive(Clone)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub filter: MarketFilter,
    pub callback: UpdateCallback,
    pub created_at: DateTime<Utc>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("filter", &self.filter)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct RegistryState {
    /// In registration order
    entries: Vec<Subscription>,
    feed_registered: bool,
}

pub struct SubscriptionRegistry {
    state: Mutex<RegistryState>,
    next_id: AtomicU64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn add(&self, filter: MarketFilter, callback: UpdateCallback) -> SubscriptionId {
        let id = SubscriptionId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let subscription = Subscription {
            id,
            filter,
            callback,
            created_at: Utc::now(),
        };
        debug!("Adding {} for {}", id, subscription.filter);
        self.state.lock().entries.push(subscription);
        id
    }

    /// Remove a subscription
    ///
    /// Returns true when this removal left the registry empty. Unknown ids
    /// are ignored and return false.
    pub fn remove(&self, id: SubscriptionId) -> bool {
        let mut state = self.state.lock();
        let before = state.entries.len();
        state.entries.retain(|subscription| subscription.id != id);
        let removed = state.entries.len() != before;
        if removed {
            debug!("Removed {}", id);
        }
        removed && state.entries.is_empty()
    }

    /// Remove every subscription, returning how many there were
    pub fn remove_all(&self) -> usize {
        let mut state = self.state.lock();
        let count = state.entries.len();
        state.entries.clear();
        count
    }

    /// Snapshot of the subscriptions interested in `market_name`, in registration order
    pub fn matching(&self, market_name: &str) -> Vec<Subscription> {
        self.state
            .lock()
            .entries
            .iter()
            .filter(|subscription| subscription.filter.matches(market_name))
            .cloned()
            .collect()
    }

    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.state
            .lock()
            .entries
            .iter()
            .any(|subscription| subscription.id == id)
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Claim the right to issue the remote feed registration
    ///
    /// Succeeds at most once until the flag is released or reset, and never
    /// while the registry is empty.
    pub fn claim_feed_registration(&self) -> bool {
        let mut state = self.state.lock();
        if state.feed_registered || state.entries.is_empty() {
            return false;
        }
        state.feed_registered = true;
        true
    }

    /// Forget the registration, after a failed attempt or a lost connection
    pub fn reset_feed(&self) {
        self.state.lock().feed_registered = false;
    }

    pub fn is_feed_registered(&self) -> bool {
        self.state.lock().feed_registered
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
