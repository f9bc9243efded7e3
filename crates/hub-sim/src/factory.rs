use deltastream_ports::{ConnectionFactory, HubConnection, TransportError, TransportResult};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::connection::{ConnectBehavior, SimConnection};

/// Factory handing out one shared [`SimConnection`]
///
/// Clones share the connection and the creation log, so a test can keep one
/// clone for inspection and give another to the client.
#[derive(Clone)]
pub struct SimConnectionFactory {
    connection: Arc<SimConnection>,
    addresses: Arc<Mutex<Vec<String>>>,
    failure: Arc<Mutex<Option<String>>>,
}

impl SimConnectionFactory {
    pub fn new(behavior: ConnectBehavior) -> Self {
        Self {
            connection: Arc::new(SimConnection::new(behavior)),
            addresses: Arc::new(Mutex::new(Vec::new())),
            failure: Arc::new(Mutex::new(None)),
        }
    }

    pub fn connection(&self) -> Arc<SimConnection> {
        Arc::clone(&self.connection)
    }

    /// Make subsequent `create` calls fail
    pub fn fail_creation(&self, reason: Option<&str>) {
        *self.failure.lock() = reason.map(str::to_string);
    }

    /// Addresses passed to `create`, in call order
    pub fn created_for(&self) -> Vec<String> {
        self.addresses.lock().clone()
    }

    pub fn create_count(&self) -> usize {
        self.addresses.lock().len()
    }
}

impl ConnectionFactory for SimConnectionFactory {
    fn create(&self, address: &str) -> TransportResult<Arc<dyn HubConnection>> {
        if let Some(reason) = self.failure.lock().clone() {
            return Err(TransportError::Connection(reason));
        }
        self.addresses.lock().push(address.to_string());
        let connection: Arc<dyn HubConnection> = self.connection.clone();
        Ok(connection)
    }
}
