use std::sync::Arc;
use std::time::Duration;

use msgnet_frame::{Message, MessageId};
use msgnet_queue::ConcurrentQueue;
use msgnet_transport::{Reactor, ReactorConfig};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::connection::{Connection, ConnectionConfig, Owner};
use crate::error::{PeerError, Result};
use crate::owned::OwnedMessage;

/// Configuration for a [`Client`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub reactor: ReactorConfig,
    pub connection: ConnectionConfig,
    /// Upper bound on name resolution plus the TCP connect. Default: 5s.
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            reactor: ReactorConfig::default(),
            connection: ConnectionConfig::default(),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Client side of a msgnet link: one connection to one server.
///
/// Received messages land on [`Client::incoming`], which the application
/// drains from its own thread. A client must not be created or dropped from
/// inside an async runtime, since it owns its own reactor.
pub struct Client<T: MessageId> {
    reactor: Reactor,
    connection_config: ConnectionConfig,
    connect_timeout: Duration,
    connection: Mutex<Option<Arc<Connection<T>>>>,
    incoming: Arc<ConcurrentQueue<OwnedMessage<T>>>,
}

impl<T: MessageId> Client<T> {
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self {
            reactor: Reactor::new(config.reactor)?,
            connection_config: config.connection,
            connect_timeout: config.connect_timeout,
            connection: Mutex::new(None),
            incoming: Arc::new(ConcurrentQueue::new()),
        })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(ClientConfig::default())
    }

    /// Resolve `host` and connect to `port`, then start the connection.
    ///
    /// Any existing connection is closed first, and the client keeps only the
    /// connection installed last when `connect` races with itself. On failure
    /// the client is left disconnected; there is no retry.
    pub fn connect(&self, host: &str, port: u16) -> Result<()> {
        self.disconnect();

        let timeout = self.connect_timeout;
        let attempt = self.reactor.block_on(async move {
            tokio::time::timeout(timeout, msgnet_transport::connect(host, port)).await
        })?;
        let stream = attempt.map_err(|_| PeerError::ConnectTimeout(timeout))??;

        let connection = Connection::new(
            Owner::Client,
            stream,
            Arc::clone(&self.incoming),
            self.connection_config.clone(),
        );
        connection.start(&self.reactor.handle()?)?;
        info!(host, port, peer = ?connection.peer_addr(), "connected");

        let replaced = self.connection.lock().replace(connection);
        if let Some(old) = replaced {
            old.close();
            debug!(peer = ?old.peer_addr(), "replaced by concurrent connect");
        }
        Ok(())
    }

    /// Close the current connection, if any.
    pub fn disconnect(&self) {
        if let Some(connection) = self.connection.lock().take() {
            connection.close();
            debug!(peer = ?connection.peer_addr(), "disconnected");
        }
    }

    /// True while the connection exists and has not reached `Closed`.
    pub fn is_connected(&self) -> bool {
        self.connection
            .lock()
            .as_ref()
            .is_some_and(|connection| connection.is_connected())
    }

    pub fn send(&self, msg: Message<T>) -> Result<()> {
        let connection = self.connection().ok_or(PeerError::NotConnected)?;
        connection.send(msg)
    }

    /// Messages received from the server, oldest first.
    pub fn incoming(&self) -> &ConcurrentQueue<OwnedMessage<T>> {
        &self.incoming
    }

    pub fn connection(&self) -> Option<Arc<Connection<T>>> {
        self.connection.lock().clone()
    }
}

impl<T: MessageId> Drop for Client<T> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl<T: MessageId> std::fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("connected", &self.is_connected())
            .field("incoming", &self.incoming.len())
            .finish()
    }
}
