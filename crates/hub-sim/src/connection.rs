use async_trait::async_trait;
use deltastream_ports::{
    ConnectionState, CookieSet, EventSource, HubConnection, HubProxy, StateChange,
    TransportError, TransportResult,
};
use log::debug;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crate::proxy::SimProxy;

/// How the next `start` call settles
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectBehavior {
    /// Connecting -> Connected
    Connect,
    /// Connecting -> Disconnected, as when the anti-bot front end rejects the handshake
    Refuse,
    /// Refuse until session cookies are installed, then connect
    RequireCookies,
    /// `start` itself returns an error
    Fail(String),
}

/// Scripted hub connection
///
/// State changes are emitted synchronously from `start` unless a settle delay
/// is configured, in which case a background task settles the connection
/// later, the way a real transport reports from its I/O thread.
pub struct SimConnection {
    behavior: Mutex<ConnectBehavior>,
    settle_delay: Mutex<Option<Duration>>,
    state: Arc<Mutex<ConnectionState>>,
    state_changed: Arc<EventSource<StateChange>>,
    closed: Arc<EventSource<()>>,
    drop_after_connect: AtomicBool,
    cookies: Mutex<Option<CookieSet>>,
    proxy: Arc<SimProxy>,
    hub_names: Mutex<Vec<String>>,
    start_calls: AtomicUsize,
    stop_calls: AtomicUsize,
    last_stop_timeout: Mutex<Option<Duration>>,
}

impl SimConnection {
    pub fn new(behavior: ConnectBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            settle_delay: Mutex::new(None),
            state: Arc::new(Mutex::new(ConnectionState::Disconnected)),
            state_changed: Arc::new(EventSource::new()),
            closed: Arc::new(EventSource::new()),
            drop_after_connect: AtomicBool::new(false),
            cookies: Mutex::new(None),
            proxy: Arc::new(SimProxy::new()),
            hub_names: Mutex::new(Vec::new()),
            start_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
            last_stop_timeout: Mutex::new(None),
        }
    }

    /// Change how subsequent `start` calls settle
    pub fn set_behavior(&self, behavior: ConnectBehavior) {
        *self.behavior.lock() = behavior;
    }

    /// Settle connect attempts from a background task after `delay`
    pub fn set_settle_delay(&self, delay: Option<Duration>) {
        *self.settle_delay.lock() = delay;
    }

    /// Simulate the server dropping an established connection
    pub fn drop_connection(&self) {
        debug!("Simulated connection dropped");
        drop_link(&self.state, &self.state_changed, &self.closed);
    }

    /// Drop the next successful connect right after reporting Connected
    pub fn drop_next_connect(&self) {
        self.drop_after_connect.store(true, Ordering::SeqCst);
    }

    pub fn proxy(&self) -> Arc<SimProxy> {
        Arc::clone(&self.proxy)
    }

    pub fn cookies(&self) -> Option<CookieSet> {
        self.cookies.lock().clone()
    }

    pub fn hub_names(&self) -> Vec<String> {
        self.hub_names.lock().clone()
    }

    pub fn start_count(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    pub fn last_stop_timeout(&self) -> Option<Duration> {
        *self.last_stop_timeout.lock()
    }

    /// Number of handlers currently listening for unexpected closes
    pub fn closed_handler_count(&self) -> usize {
        self.closed.handler_count()
    }

    fn outcome(&self) -> TransportResult<ConnectionState> {
        match &*self.behavior.lock() {
            ConnectBehavior::Connect => Ok(ConnectionState::Connected),
            ConnectBehavior::Refuse => Ok(ConnectionState::Disconnected),
            ConnectBehavior::RequireCookies => {
                if self.cookies.lock().is_some() {
                    Ok(ConnectionState::Connected)
                } else {
                    Ok(ConnectionState::Disconnected)
                }
            }
            ConnectBehavior::Fail(reason) => Err(TransportError::Connection(reason.clone())),
        }
    }
}

#[async_trait]
impl HubConnection for SimConnection {
    async fn start(&self) -> TransportResult<()> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self.outcome()?;

        transition(&self.state, &self.state_changed, ConnectionState::Connecting);

        let drop_after = outcome == ConnectionState::Connected
            && self.drop_after_connect.swap(false, Ordering::SeqCst);

        let delay = *self.settle_delay.lock();
        match delay {
            Some(delay) => {
                let state = Arc::clone(&self.state);
                let events = Arc::clone(&self.state_changed);
                let closed = Arc::clone(&self.closed);
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    transition(&state, &events, outcome);
                    if drop_after {
                        drop_link(&state, &events, &closed);
                    }
                });
            }
            None => {
                transition(&self.state, &self.state_changed, outcome);
                if drop_after {
                    drop_link(&self.state, &self.state_changed, &self.closed);
                }
            }
        }

        Ok(())
    }

    async fn stop(&self, timeout: Duration) {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_stop_timeout.lock() = Some(timeout);

        let was = transition(&self.state, &self.state_changed, ConnectionState::Disconnected);
        if was == ConnectionState::Connected {
            self.closed.emit(&());
        }
    }

    fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    fn state_changed(&self) -> &EventSource<StateChange> {
        &self.state_changed
    }

    fn closed(&self) -> &EventSource<()> {
        &self.closed
    }

    fn create_hub_proxy(&self, hub_name: &str) -> TransportResult<Arc<dyn HubProxy>> {
        self.hub_names.lock().push(hub_name.to_string());
        let proxy: Arc<dyn HubProxy> = self.proxy.clone();
        Ok(proxy)
    }

    fn set_cookies(&self, cookies: CookieSet) {
        *self.cookies.lock() = Some(cookies);
    }
}

fn drop_link(
    state: &Mutex<ConnectionState>,
    events: &EventSource<StateChange>,
    closed: &EventSource<()>,
) {
    transition(state, events, ConnectionState::Disconnected);
    closed.emit(&());
}

/// Move to `new`, emitting a notification if the state changed; returns the old state
fn transition(
    state: &Mutex<ConnectionState>,
    events: &EventSource<StateChange>,
    new: ConnectionState,
) -> ConnectionState {
    let old = std::mem::replace(&mut *state.lock(), new);
    if old != new {
        events.emit(&StateChange::new(old, new));
    }
    old
}
