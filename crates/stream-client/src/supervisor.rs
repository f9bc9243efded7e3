//! Reconnect supervisor
//!
//! Reacts to the transport's "closed" notification. At most one reconnect loop
//! runs per client; it retries with backoff until the connection is back, the
//! registry empties, or the client is disposed.

use deltastream_ports::ConnectionState;
use log::{debug, error, info};
use std::sync::Arc;
use std::sync::atomic::Ordering;

use crate::client::Inner;

/// Entry point for the closed notification
///
/// Only acts on a connection the client believes is up; the close the client
/// causes itself happens after the state was already set to Disconnected.
pub(crate) fn on_unexpected_close(inner: &Arc<Inner>) {
    if inner.is_disposed() || inner.registry.is_empty() {
        debug!("Connection closed with nothing to restore");
        return;
    }
    if !inner.manager.begin_reconnect() {
        debug!(
            "Ignoring close notification in state {}",
            inner.manager.state()
        );
        return;
    }

    info!("Connection closed unexpectedly, reconnecting");
    inner.registry.reset_feed();

    if inner.reconnecting.swap(true, Ordering::SeqCst) {
        debug!("Reconnect already in progress");
        return;
    }

    let Some(runtime) = inner.manager.runtime() else {
        error!("No runtime available to reconnect on");
        inner.reconnecting.store(false, Ordering::SeqCst);
        return;
    };

    let inner = Arc::clone(inner);
    runtime.spawn(async move { run(&inner).await });
}

/// Retry until connected; clears the in-progress flag on every exit
async fn run(inner: &Inner) {
    let mut attempt: u32 = 0;
    loop {
        let delay = inner.config.reconnect_delay(attempt);
        if !delay.is_zero() {
            tokio::select! {
                _ = inner.shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        if !still_wanted(inner) {
            break;
        }
        attempt += 1;

        if let Err(e) = inner.manager.ensure_connected().await {
            error!("Reconnect attempt {} failed: {}", attempt, e);
            continue;
        }
        if !still_wanted(inner) {
            break;
        }
        if let Err(e) = inner.manager.ensure_feed(&inner.registry, &inner.router).await {
            error!("Re-registering feed after reconnect failed: {}", e);
            continue;
        }

        info!("Reconnected after {} attempt(s)", attempt);

        // Another close may have arrived after the connect succeeded but
        // while this loop still held the in-progress flag
        inner.reconnecting.store(false, Ordering::SeqCst);
        if inner.manager.state() != ConnectionState::Reconnecting
            || inner.reconnecting.swap(true, Ordering::SeqCst)
        {
            return;
        }
        attempt = 0;
    }
    inner.reconnecting.store(false, Ordering::SeqCst);
    debug!("Reconnect loop stopped after {} attempt(s)", attempt);
}

fn still_wanted(inner: &Inner) -> bool {
    !inner.shutdown.is_cancelled() && !inner.is_disposed() && !inner.registry.is_empty()
}
