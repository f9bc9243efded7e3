use deltastream_core::{MarketFilter, MarketUpdate, SubscriptionId};
use deltastream_ports::{ChallengeSolver, ConnectionFactory, ConnectionState};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;

use crate::config::StreamConfig;
use crate::connection::{ClosedHook, ConnectionManager};
use crate::error::{StreamError, SubscribeResult};
use crate::observer::{DispatchObserver, LogObserver};
use crate::registry::{SubscriptionRegistry, UpdateCallback};
use crate::router::MessageRouter;
use crate::supervisor;

pub(crate) struct Inner {
    pub(crate) config: StreamConfig,
    pub(crate) registry: Arc<SubscriptionRegistry>,
    pub(crate) manager: ConnectionManager,
    pub(crate) router: Arc<MessageRouter>,
    pub(crate) shutdown: CancellationToken,
    pub(crate) reconnecting: AtomicBool,
    disposed: AtomicBool,
}

impl Inner {
    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

/// Client for the market summary feed
///
/// Many logical subscriptions share one hub connection. The connection is
/// opened by the first subscribe, closed again when the last subscription
/// goes away, and restored automatically if it drops in between.
///
/// Cloning is cheap; clones share the same connection and subscriptions.
#[derive(Clone)]
pub struct SummaryStreamClient {
    inner: Arc<Inner>,
}

impl SummaryStreamClient {
    /// Create a client that reports dispatch problems through the log
    pub fn with_collaborators(
        config: StreamConfig,
        factory: Arc<dyn ConnectionFactory>,
        solver: Arc<dyn ChallengeSolver>,
    ) -> Self {
        Self::with_observer(config, factory, solver, Arc::new(LogObserver))
    }

    pub fn with_observer(
        config: StreamConfig,
        factory: Arc<dyn ConnectionFactory>,
        solver: Arc<dyn ChallengeSolver>,
        observer: Arc<dyn DispatchObserver>,
    ) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| {
            let weak = weak.clone();
            let on_closed: ClosedHook = Arc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    supervisor::on_unexpected_close(&inner);
                }
            });

            let registry = Arc::new(SubscriptionRegistry::new());
            Inner {
                manager: ConnectionManager::new(config.clone(), factory, solver, on_closed),
                router: Arc::new(MessageRouter::new(Arc::clone(&registry), observer)),
                registry,
                config,
                shutdown: CancellationToken::new(),
                reconnecting: AtomicBool::new(false),
                disposed: AtomicBool::new(false),
            }
        });
        Self { inner }
    }

    /// Receive updates for exactly `market` (case-sensitive)
    pub async fn subscribe_to_market<F>(&self, market: impl Into<String>, callback: F) -> SubscribeResult
    where
        F: Fn(&MarketUpdate) + Send + Sync + 'static,
    {
        self.subscribe(MarketFilter::market(market), Arc::new(callback))
            .await
    }

    /// Receive updates for every market
    pub async fn subscribe_to_all_markets<F>(&self, callback: F) -> SubscribeResult
    where
        F: Fn(&MarketUpdate) + Send + Sync + 'static,
    {
        self.subscribe(MarketFilter::All, Arc::new(callback)).await
    }

    /// Register a subscription and make sure the feed is flowing
    ///
    /// On failure nothing stays registered.
    pub async fn subscribe(&self, filter: MarketFilter, callback: UpdateCallback) -> SubscribeResult {
        let inner = &self.inner;
        if inner.is_disposed() {
            return Err(StreamError::Disposed);
        }

        let id = inner.registry.add(filter, callback);

        let connected = match inner.manager.ensure_connected().await {
            Ok(()) => {
                inner
                    .manager
                    .ensure_feed(&inner.registry, &inner.router)
                    .await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = connected {
            warn!("Subscribe {} failed: {}", id, e);
            self.roll_back(id).await;
            return Err(e);
        }

        // Dispose may have cleared the registry after the feed was registered;
        // its shutdown detaches the router and resets the flag under the gate
        if inner.is_disposed() {
            self.roll_back(id).await;
            return Err(StreamError::Disposed);
        }

        Ok(id)
    }

    /// Remove a subscription, closing the connection if it was the last one
    ///
    /// Unknown ids, and calls after `dispose`, are no-ops.
    pub async fn unsubscribe(&self, id: SubscriptionId) {
        if self.inner.registry.remove(id) {
            self.inner.manager.close_if_idle(&self.inner.registry).await;
        }
    }

    /// Remove a subscription without waiting for the connection to close
    ///
    /// Usable from inside a callback: the subscription stops receiving
    /// updates immediately, and the close (if any) runs on the runtime.
    pub fn unsubscribe_in_background(&self, id: SubscriptionId) {
        if !self.inner.registry.remove(id) {
            return;
        }
        match self.inner.manager.runtime() {
            Some(runtime) => {
                let client = self.clone();
                runtime.spawn(async move {
                    client
                        .inner
                        .manager
                        .close_if_idle(&client.inner.registry)
                        .await;
                });
            }
            None => warn!("No runtime available, connection left open after {}", id),
        }
    }

    /// Remove every subscription and close the connection
    pub async fn unsubscribe_all(&self) {
        let removed = self.inner.registry.remove_all();
        debug!("Removed {} subscriptions", removed);
        if removed > 0 {
            self.inner.manager.close_if_idle(&self.inner.registry).await;
        }
    }

    /// Shut the client down
    ///
    /// Cancels any reconnect in progress, drops every subscription and stops
    /// the connection. Later subscribes fail with [`StreamError::Disposed`].
    /// Safe to call more than once.
    pub async fn dispose(&self) {
        let inner = &self.inner;
        if inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        info!("Disposing stream client");
        inner.shutdown.cancel();
        inner.registry.remove_all();
        inner.manager.shutdown(&inner.registry).await;
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.inner.manager.state()
    }

    pub fn subscription_count(&self) -> usize {
        self.inner.registry.len()
    }

    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.inner.registry.contains(id)
    }

    /// Whether the remote feed registration is currently in place
    pub fn is_feed_registered(&self) -> bool {
        self.inner.registry.is_feed_registered()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    pub fn config(&self) -> &StreamConfig {
        &self.inner.config
    }

    async fn roll_back(&self, id: SubscriptionId) {
        if self.inner.registry.remove(id) {
            self.inner.manager.close_if_idle(&self.inner.registry).await;
        }
    }
}
