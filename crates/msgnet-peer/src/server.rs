use std::collections::HashMap;
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use msgnet_frame::{Message, MessageId};
use msgnet_queue::ConcurrentQueue;
use msgnet_transport::{Reactor, ReactorConfig, TcpAcceptor};
use parking_lot::{Mutex, MutexGuard};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::connection::{Connection, ConnectionConfig, Owner};
use crate::error::{PeerError, Result};
use crate::owned::OwnedMessage;

/// Outcome of a message handler. Errors are logged and processing continues.
pub type HandlerResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Application hooks for a [`Server`].
///
/// `on_client_connect` runs on the reactor's blocking pool while the new
/// connection is vetted, so it may wait for the handler lock without stalling
/// I/O. The other two run on the thread calling [`Server::update`] (or
/// [`Server::stop`]).
pub trait ServerHandler<T: MessageId>: Send + 'static {
    /// Accept or veto a freshly accepted connection. Messages sent here are
    /// delivered once the connection starts. Default: accept.
    fn on_client_connect(&mut self, _client: &Arc<Connection<T>>) -> bool {
        true
    }

    /// Called once for every connection that leaves the active set.
    fn on_client_disconnect(&mut self, _client: &Arc<Connection<T>>) {}

    fn on_message(
        &mut self,
        ctx: &ServerContext<T>,
        client: &Arc<Connection<T>>,
        msg: Message<T>,
    ) -> HandlerResult;
}

/// The server's active connection set, reachable from handler code.
pub struct ServerContext<T: MessageId> {
    connections: Mutex<HashMap<u32, Arc<Connection<T>>>>,
    next_id: AtomicU32,
    closed: ConcurrentQueue<u32>,
    reaped: ConcurrentQueue<Arc<Connection<T>>>,
}

impl<T: MessageId> ServerContext<T> {
    fn new(first_client_id: u32) -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            next_id: AtomicU32::new(first_client_id),
            closed: ConcurrentQueue::new(),
            reaped: ConcurrentQueue::new(),
        }
    }

    /// Send to one client. Returns `false`, and schedules the disconnect
    /// notification, if the client is already closed.
    pub fn message_client(&self, client: &Arc<Connection<T>>, msg: Message<T>) -> bool {
        if client.send(msg).is_ok() {
            return true;
        }
        self.remove(client.id());
        false
    }

    /// Send a copy of `msg` to every live client except `exclude`.
    ///
    /// Closed connections found along the way are dropped from the set; their
    /// disconnect notification follows on the next `update` or `stop`.
    /// Returns how many clients the message was queued for.
    pub fn message_all_clients(
        &self,
        msg: &Message<T>,
        exclude: Option<&Arc<Connection<T>>>,
    ) -> usize {
        let excluded = exclude.map(|client| client.id());
        let mut connections = self.connections.lock();

        let mut sent = 0;
        let mut dead = Vec::new();
        for (&id, client) in connections.iter() {
            if Some(id) == excluded && client.is_connected() {
                continue;
            }
            if client.send(msg.clone()).is_ok() {
                sent += 1;
            } else {
                dead.push(id);
            }
        }

        for id in dead {
            if let Some(client) = connections.remove(&id) {
                self.reaped.push_back(client);
            }
        }
        sent
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn connection(&self, id: u32) -> Option<Arc<Connection<T>>> {
        self.connections.lock().get(&id).cloned()
    }

    /// Ids of the active connections, ascending.
    pub fn client_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.connections.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn remove(&self, id: u32) {
        let removed = self.connections.lock().remove(&id);
        if let Some(client) = removed {
            self.reaped.push_back(client);
        }
    }

    fn collect_closed(&self) {
        while let Some(id) = self.closed.pop_front() {
            self.remove(id);
        }
    }
}

impl<T: MessageId> std::fmt::Debug for ServerContext<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerContext")
            .field("clients", &self.client_ids())
            .finish()
    }
}

/// Configuration for a [`Server`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address. Port 0 picks a free port. Default: 127.0.0.1:60000.
    pub bind: SocketAddr,
    /// Id given to the first approved client. Default: 10000.
    pub first_client_id: u32,
    pub reactor: ReactorConfig,
    pub connection: ConnectionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 60000)),
            first_client_id: 10000,
            reactor: ReactorConfig::default(),
            connection: ConnectionConfig::default(),
        }
    }
}

/// Server side of msgnet: accepts clients and funnels their messages into
/// one queue, which [`Server::update`] turns into sequential handler calls.
pub struct Server<T: MessageId, H: ServerHandler<T>> {
    reactor: Reactor,
    config: ServerConfig,
    handler: Arc<Mutex<H>>,
    ctx: Arc<ServerContext<T>>,
    incoming: Arc<ConcurrentQueue<OwnedMessage<T>>>,
    accept_cancel: Option<CancellationToken>,
    local_addr: Option<SocketAddr>,
}

impl<T: MessageId, H: ServerHandler<T>> Server<T, H> {
    pub fn new(config: ServerConfig, handler: H) -> Result<Self> {
        let reactor = Reactor::new(config.reactor.clone())?;
        Ok(Self {
            reactor,
            ctx: Arc::new(ServerContext::new(config.first_client_id)),
            config,
            handler: Arc::new(Mutex::new(handler)),
            incoming: Arc::new(ConcurrentQueue::new()),
            accept_cancel: None,
            local_addr: None,
        })
    }

    /// Bind the listener and start accepting. Returns the bound address.
    pub fn start(&mut self) -> Result<SocketAddr> {
        if self.accept_cancel.is_some() {
            return Err(PeerError::AlreadyStarted);
        }

        let listener = self.reactor.block_on(TcpAcceptor::bind(self.config.bind))??;
        let addr = listener.local_addr();
        info!(addr = %addr, transport = listener.transport_name(), "server started");

        let cancel = CancellationToken::new();
        let accept = AcceptLoop {
            handler: Arc::clone(&self.handler),
            ctx: Arc::clone(&self.ctx),
            incoming: Arc::clone(&self.incoming),
            config: self.config.connection.clone(),
        };
        self.reactor.spawn(accept.run(listener, cancel.clone()))?;

        self.accept_cancel = Some(cancel);
        self.local_addr = Some(addr);
        Ok(addr)
    }

    /// Stop accepting, close every client and deliver their disconnect
    /// notifications. The server can be started again afterwards.
    pub fn stop(&mut self) {
        let Some(cancel) = self.accept_cancel.take() else {
            return;
        };
        self.local_addr = None;

        // Cancel under the map lock so a connection still being vetted either
        // lands in the snapshot below or sees the cancellation and closes.
        let clients: Vec<_> = {
            let connections = self.ctx.connections.lock();
            cancel.cancel();
            connections.values().cloned().collect()
        };
        for client in &clients {
            client.close();
        }

        let mut handler = self.handler.lock();
        let reaped = self.reap(&mut handler);
        info!(clients = reaped, "server stopped");
    }

    /// Deliver queued messages to the handler.
    ///
    /// Processes at most `max_messages` messages, or all of them if it is
    /// negative. With `wait_for_message` set, blocks first until at least one
    /// message is queued. Closed connections are then reaped and reported
    /// through `on_client_disconnect`. Returns the number of messages taken
    /// off the queue.
    pub fn update(&self, max_messages: isize, wait_for_message: bool) -> usize {
        if wait_for_message {
            self.incoming.wait();
        }

        let limit = usize::try_from(max_messages).unwrap_or(usize::MAX);
        let mut handler = self.handler.lock();
        let mut processed = 0;

        while processed < limit {
            let Some(owned) = self.incoming.pop_front() else {
                break;
            };
            processed += 1;

            let Some(client) = owned.remote() else {
                debug!(connection = ?owned.remote_id(), "dropping message from released connection");
                continue;
            };
            let msg = owned.into_message();
            let id = msg.id();

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                handler.on_message(&self.ctx, &client, msg)
            }));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(connection = client.id(), id = ?id, error = %err, "message handler failed")
                }
                Err(_) => warn!(connection = client.id(), id = ?id, "message handler panicked"),
            }
        }

        self.reap(&mut handler);
        processed
    }

    pub fn message_client(&self, client: &Arc<Connection<T>>, msg: Message<T>) -> bool {
        self.ctx.message_client(client, msg)
    }

    /// Send a copy of `msg` to every live client except `exclude`.
    ///
    /// Closed clients found here leave the active set at once, but their
    /// `on_client_disconnect` runs on the next [`Server::update`] or
    /// [`Server::stop`].
    pub fn message_all_clients(
        &self,
        msg: &Message<T>,
        exclude: Option<&Arc<Connection<T>>>,
    ) -> usize {
        self.ctx.message_all_clients(msg, exclude)
    }

    pub fn context(&self) -> &ServerContext<T> {
        &self.ctx
    }

    /// Messages waiting for [`Server::update`].
    pub fn incoming(&self) -> &ConcurrentQueue<OwnedMessage<T>> {
        &self.incoming
    }

    /// Lock the handler. Do not hold the guard across `update` or `stop`.
    pub fn handler(&self) -> MutexGuard<'_, H> {
        self.handler.lock()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        self.accept_cancel.is_some()
    }

    fn reap(&self, handler: &mut H) -> usize {
        self.ctx.collect_closed();

        let mut reaped = 0;
        while let Some(client) = self.ctx.reaped.pop_front() {
            info!(connection = client.id(), "client disconnected");
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| handler.on_client_disconnect(&client)));
            if outcome.is_err() {
                warn!(connection = client.id(), "disconnect handler panicked");
            }
            reaped += 1;
        }
        reaped
    }
}

impl<T: MessageId, H: ServerHandler<T>> Drop for Server<T, H> {
    fn drop(&mut self) {
        self.stop();
    }
}

struct AcceptLoop<T: MessageId, H> {
    handler: Arc<Mutex<H>>,
    ctx: Arc<ServerContext<T>>,
    incoming: Arc<ConcurrentQueue<OwnedMessage<T>>>,
    config: ConnectionConfig,
}

impl<T: MessageId, H: ServerHandler<T>> AcceptLoop<T, H> {
    async fn run(self, listener: TcpAcceptor, cancel: CancellationToken) {
        let this = Arc::new(self);
        let handle = Handle::current();
        loop {
            let (stream, addr) = tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(err) => {
                        warn!(error = %err, "accept failed");
                        continue;
                    }
                },
            };

            // Vetting takes the handler lock, which `update` holds while
            // messages are dispatched.
            let this = Arc::clone(&this);
            let handle = handle.clone();
            let cancel = cancel.clone();
            tokio::task::spawn_blocking(move || this.admit(stream, addr, &handle, &cancel));
        }
        debug!(addr = %listener.local_addr(), "accept loop stopped");
    }

    fn admit(
        &self,
        stream: TcpStream,
        addr: SocketAddr,
        handle: &Handle,
        cancel: &CancellationToken,
    ) {
        let client = Connection::new(
            Owner::Server,
            stream,
            Arc::clone(&self.incoming),
            self.config.clone(),
        );

        let approved = panic::catch_unwind(AssertUnwindSafe(|| {
            self.handler.lock().on_client_connect(&client)
        }))
        .unwrap_or(false);
        if !approved {
            info!(peer = %addr, "connection denied");
            client.close();
            return;
        }

        let id = self.ctx.next_id.fetch_add(1, Ordering::Relaxed);
        client.assign_id(id);
        let ctx = Arc::downgrade(&self.ctx);
        client.set_close_hook(move |id| {
            if let Some(ctx) = ctx.upgrade() {
                ctx.closed.push_back(id);
            }
        });

        {
            let mut connections = self.ctx.connections.lock();
            if cancel.is_cancelled() {
                drop(connections);
                debug!(connection = id, peer = %addr, "server stopped while vetting");
                client.close();
                return;
            }
            connections.insert(id, Arc::clone(&client));
        }

        if let Err(err) = client.start(handle) {
            warn!(connection = id, error = %err, "connection failed to start");
            client.close();
            return;
        }
        info!(connection = id, peer = %addr, "connection approved");
    }
}
