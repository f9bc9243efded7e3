//! Connection manager
//!
//! Owns the single hub connection and its proxy, runs the connect sequence
//! (with the challenge-bypass fallback) and tears the connection down again.
//! Connect and close sequences are serialized by an async gate; the state
//! lock is never held across an await.

use deltastream_ports::{
    ChallengeSolver, ConnectionFactory, ConnectionState, EventSource, HandlerId, HubConnection,
    HubProxy, RawBatch, StateChange, TransportError,
};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::config::StreamConfig;
use crate::error::StreamError;
use crate::registry::SubscriptionRegistry;
use crate::router::MessageRouter;

/// Invoked when the transport reports an unexpected close
pub(crate) type ClosedHook = Arc<dyn Fn() + Send + Sync>;

/// The connection and the proxy created for it
struct Link {
    connection: Arc<dyn HubConnection>,
    proxy: Arc<dyn HubProxy>,
    closed_handler: HandlerId,
}

/// Router attachment on the feed event
struct FeedHandler {
    source: Arc<EventSource<RawBatch>>,
    id: HandlerId,
}

pub(crate) struct ConnectionManager {
    config: StreamConfig,
    factory: Arc<dyn ConnectionFactory>,
    solver: Arc<dyn ChallengeSolver>,
    on_closed: ClosedHook,
    state: Mutex<ConnectionState>,
    link: Mutex<Option<Arc<Link>>>,
    feed_handler: Mutex<Option<FeedHandler>>,
    runtime: Mutex<Option<Handle>>,
    gate: tokio::sync::Mutex<()>,
    shut_down: AtomicBool,
    /// A close notification arrived while a connect attempt was running
    close_pending: AtomicBool,
}

impl ConnectionManager {
    pub fn new(
        config: StreamConfig,
        factory: Arc<dyn ConnectionFactory>,
        solver: Arc<dyn ChallengeSolver>,
        on_closed: ClosedHook,
    ) -> Self {
        Self {
            config,
            factory,
            solver,
            on_closed,
            state: Mutex::new(ConnectionState::Disconnected),
            link: Mutex::new(None),
            feed_handler: Mutex::new(None),
            runtime: Mutex::new(None),
            gate: tokio::sync::Mutex::new(()),
            shut_down: AtomicBool::new(false),
            close_pending: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Runtime the client was first used from, for work started off a transport thread
    pub fn runtime(&self) -> Option<Handle> {
        self.runtime
            .lock()
            .clone()
            .or_else(|| Handle::try_current().ok())
    }

    /// Move Connected -> Reconnecting; false when the connection was not up
    ///
    /// A close landing while a connect attempt runs is remembered, and that
    /// attempt is then treated as failed.
    pub fn begin_reconnect(&self) -> bool {
        let mut state = self.state.lock();
        match *state {
            ConnectionState::Connected => {
                *state = ConnectionState::Reconnecting;
                true
            }
            ConnectionState::Connecting | ConnectionState::Reconnecting => {
                self.close_pending.store(true, Ordering::SeqCst);
                false
            }
            ConnectionState::Disconnected => false,
        }
    }

    /// Make sure the connection is up, connecting (and bypassing) if needed
    pub async fn ensure_connected(&self) -> Result<(), StreamError> {
        let _gate = self.gate.lock().await;
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(StreamError::Disposed);
        }

        let link = self.link()?;
        if self.state() == ConnectionState::Connected && link.connection.state().is_connected() {
            return Ok(());
        }

        {
            let mut state = self.state.lock();
            if *state != ConnectionState::Reconnecting {
                *state = ConnectionState::Connecting;
            }
        }

        let mut result = self.connect(&link.connection).await;
        let mut state = self.state.lock();
        if result.is_ok()
            && (self.close_pending.swap(false, Ordering::SeqCst)
                || !link.connection.state().is_connected())
        {
            result = Err(StreamError::Connection(
                "connection dropped right after connecting".to_string(),
            ));
        }
        match &result {
            Ok(()) => {
                info!("Connected to {}", self.config.address);
                *state = ConnectionState::Connected;
            }
            Err(e) => {
                warn!("Connecting to {} failed: {}", self.config.address, e);
                if *state != ConnectionState::Reconnecting {
                    *state = ConnectionState::Disconnected;
                }
            }
        }
        result
    }

    /// Issue the remote feed registration unless it is already in place
    ///
    /// Runs under the gate, so a subscriber arriving while another one is
    /// registering waits for that outcome, and re-issues the registration
    /// itself if it failed.
    pub async fn ensure_feed(
        &self,
        registry: &SubscriptionRegistry,
        router: &Arc<MessageRouter>,
    ) -> Result<(), StreamError> {
        let _gate = self.gate.lock().await;
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(StreamError::Disposed);
        }
        match self.state() {
            ConnectionState::Connected => {}
            // The reconnect loop registers once the connection is back
            ConnectionState::Reconnecting => return Ok(()),
            state => {
                return Err(StreamError::Connection(format!(
                    "connection {} before feed registration",
                    state
                )));
            }
        }
        if !registry.claim_feed_registration() {
            return Ok(());
        }

        if let Err(e) = self.register_feed(router).await {
            registry.reset_feed();
            return Err(e);
        }
        info!("Registered for {}", self.config.feed_event);
        Ok(())
    }

    /// Attach the router to the feed event and issue the remote registration
    async fn register_feed(&self, router: &Arc<MessageRouter>) -> Result<(), StreamError> {
        let proxy = self
            .current_link()
            .map(|link| Arc::clone(&link.proxy))
            .ok_or(StreamError::Transport(TransportError::NotConnected))?;

        self.attach_router(proxy.as_ref(), router);

        debug!("Invoking {}", self.config.feed_action);
        if let Err(e) = proxy.invoke(&self.config.feed_action, Vec::new()).await {
            self.detach_router();
            return Err(StreamError::FeedRegistration(e.to_string()));
        }
        Ok(())
    }

    /// Stop the connection if nothing is subscribed any more
    pub async fn close_if_idle(&self, registry: &SubscriptionRegistry) {
        let _gate = self.gate.lock().await;
        // A subscribe may have slipped in while we waited for the gate
        if !registry.is_empty() {
            debug!("Skipping close, {} subscriptions active", registry.len());
            return;
        }
        self.stop(registry).await;
    }

    /// Stop the connection for good; later connect attempts fail with `Disposed`
    pub async fn shutdown(&self, registry: &SubscriptionRegistry) {
        let _gate = self.gate.lock().await;
        self.shut_down.store(true, Ordering::SeqCst);
        self.stop(registry).await;
        if let Some(link) = self.link.lock().take() {
            link.connection.closed().detach(link.closed_handler);
        }
    }

    async fn stop(&self, registry: &SubscriptionRegistry) {
        let previous = std::mem::replace(&mut *self.state.lock(), ConnectionState::Disconnected);
        registry.reset_feed();
        self.detach_router();

        let Some(link) = self.current_link() else {
            return;
        };
        if previous == ConnectionState::Disconnected
            && link.connection.state() == ConnectionState::Disconnected
        {
            return;
        }

        info!("Closing connection to {}", self.config.address);
        link.connection.stop(self.config.close_timeout()).await;
    }

    async fn connect(&self, connection: &Arc<dyn HubConnection>) -> Result<(), StreamError> {
        if self.start(connection).await? == ConnectionState::Connected {
            return Ok(());
        }

        warn!(
            "Connection refused, solving challenge with {}",
            self.solver.name()
        );
        let cookies = self
            .solver
            .get_cookies(
                &self.config.address,
                &self.config.bypass_identity,
                self.config.bypass_timeout_secs,
            )
            .await
            .ok_or_else(|| StreamError::ChallengeFailed {
                address: self.config.address.clone(),
            })?;

        debug!("Installing {} cookies and retrying", cookies.len());
        connection.set_cookies(cookies);

        match self.start(connection).await? {
            ConnectionState::Connected => Ok(()),
            state => Err(StreamError::Connection(format!(
                "still {} after challenge bypass",
                state
            ))),
        }
    }

    /// Start the transport and wait for the state to settle
    async fn start(&self, connection: &Arc<dyn HubConnection>) -> Result<ConnectionState, StreamError> {
        self.close_pending.store(false, Ordering::SeqCst);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handler = connection
            .state_changed()
            .attach(move |change: &StateChange| {
                let _ = tx.send(change.new);
            });

        let started = connection.start().await;
        let settled = match started {
            Ok(()) => {
                let current = connection.state();
                if current.is_settled() {
                    current
                } else {
                    let wait = async {
                        while let Some(state) = rx.recv().await {
                            if state.is_settled() {
                                return state;
                            }
                        }
                        connection.state()
                    };
                    match tokio::time::timeout(self.config.connect_timeout(), wait).await {
                        Ok(state) => state,
                        Err(_) => {
                            warn!(
                                "Connect did not settle within {:?}",
                                self.config.connect_timeout()
                            );
                            connection.state()
                        }
                    }
                }
            }
            Err(e) => {
                connection.state_changed().detach(handler);
                return Err(e.into());
            }
        };

        connection.state_changed().detach(handler);
        debug!("Connect attempt settled as {}", settled);
        Ok(settled)
    }

    fn current_link(&self) -> Option<Arc<Link>> {
        self.link.lock().clone()
    }

    /// Get the link, creating connection and proxy on first use
    fn link(&self) -> Result<Arc<Link>, StreamError> {
        if let Some(link) = self.current_link() {
            return Ok(link);
        }

        if let Ok(handle) = Handle::try_current() {
            self.runtime.lock().get_or_insert(handle);
        }

        debug!("Creating connection to {}", self.config.address);
        let connection = self.factory.create(&self.config.address)?;
        let proxy = connection.create_hub_proxy(&self.config.hub_name)?;

        let on_closed = Arc::clone(&self.on_closed);
        let closed_handler = connection.closed().attach(move |_| on_closed());

        let link = Arc::new(Link {
            connection,
            proxy,
            closed_handler,
        });
        *self.link.lock() = Some(Arc::clone(&link));
        Ok(link)
    }

    fn attach_router(&self, proxy: &dyn HubProxy, router: &Arc<MessageRouter>) {
        let source = proxy.subscribe(&self.config.feed_event);
        let router = Arc::clone(router);

        let mut slot = self.feed_handler.lock();
        if let Some(previous) = slot.take() {
            previous.source.detach(previous.id);
        }
        let id = source.attach(move |batch: &RawBatch| router.on_raw_batch(batch));
        *slot = Some(FeedHandler { source, id });
    }

    fn detach_router(&self) {
        if let Some(handler) = self.feed_handler.lock().take() {
            handler.source.detach(handler.id);
        }
    }
}
