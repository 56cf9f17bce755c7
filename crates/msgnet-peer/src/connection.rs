use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

use bytes::BytesMut;
use msgnet_frame::{
    decode_header, encode_header, header_size, FrameConfig, FrameError, Message, MessageId,
};
use msgnet_queue::ConcurrentQueue;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::{PeerError, Result};
use crate::owned::OwnedMessage;

/// Which side of the link a connection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    Server,
    Client,
}

/// Where received messages are placed on the shared incoming queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dispatch {
    /// Append to the back (arrival order).
    #[default]
    Back,
    /// Insert at the front, ahead of anything already queued.
    Front,
}

/// Read side of the protocol state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadState {
    Idle,
    ReadingHeader,
    ReadingBody,
    Dispatching,
    Closed,
}

impl ReadState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ReadState::Idle,
            1 => ReadState::ReadingHeader,
            2 => ReadState::ReadingBody,
            3 => ReadState::Dispatching,
            _ => ReadState::Closed,
        }
    }
}

/// Write side of the protocol state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteState {
    Idle,
    WritingHeader,
    WritingBody,
    Closed,
}

impl WriteState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => WriteState::Idle,
            1 => WriteState::WritingHeader,
            2 => WriteState::WritingBody,
            _ => WriteState::Closed,
        }
    }
}

/// Per-connection behavior.
#[derive(Debug, Clone, Default)]
pub struct ConnectionConfig {
    /// Codec limits applied to incoming headers.
    pub frame: FrameConfig,
    /// Queue placement for received messages.
    pub dispatch: Dispatch,
}

enum CloseReason {
    Local,
    PeerClosed,
    Io(std::io::Error),
    Framing(FrameError),
}

impl CloseReason {
    fn from_io(err: std::io::Error) -> Self {
        if err.kind() == ErrorKind::UnexpectedEof {
            CloseReason::PeerClosed
        } else {
            CloseReason::Io(err)
        }
    }
}

type CloseHook = Box<dyn FnOnce(u32) + Send>;

/// One framed message stream over a TCP socket.
///
/// After [`Connection::start`] two tasks run on the reactor: a read loop that
/// turns bytes into [`OwnedMessage`]s on the shared incoming queue, and a
/// write loop that drains the private outgoing queue one message at a time.
/// Both tasks hold an `Arc` to the connection, so it outlives any I/O still
/// in flight. Any error, EOF or explicit [`Connection::close`] moves both
/// sides to `Closed` for good.
pub struct Connection<T: MessageId> {
    owner: Owner,
    id: AtomicU32,
    peer_addr: Option<SocketAddr>,
    config: ConnectionConfig,
    outgoing: ConcurrentQueue<Message<T>>,
    incoming: Arc<ConcurrentQueue<OwnedMessage<T>>>,
    write_ready: Notify,
    cancel: CancellationToken,
    closed: AtomicBool,
    read_state: AtomicU8,
    write_state: AtomicU8,
    stream: Mutex<Option<TcpStream>>,
    on_close: Mutex<Option<CloseHook>>,
}

impl<T: MessageId> Connection<T> {
    pub(crate) fn new(
        owner: Owner,
        stream: TcpStream,
        incoming: Arc<ConcurrentQueue<OwnedMessage<T>>>,
        config: ConnectionConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            owner,
            id: AtomicU32::new(0),
            peer_addr: stream.peer_addr().ok(),
            config,
            outgoing: ConcurrentQueue::new(),
            incoming,
            write_ready: Notify::new(),
            cancel: CancellationToken::new(),
            closed: AtomicBool::new(false),
            read_state: AtomicU8::new(ReadState::Idle as u8),
            write_state: AtomicU8::new(WriteState::Idle as u8),
            stream: Mutex::new(Some(stream)),
            on_close: Mutex::new(None),
        })
    }

    /// Server-assigned identity. Always 0 on the client side.
    pub fn id(&self) -> u32 {
        self.id.load(Ordering::Acquire)
    }

    pub fn owner(&self) -> Owner {
        self.owner
    }

    /// Remote socket address, if the OS reported one.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// True until the connection reaches `Closed`.
    pub fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    pub fn read_state(&self) -> ReadState {
        if !self.is_connected() {
            return ReadState::Closed;
        }
        ReadState::from_u8(self.read_state.load(Ordering::Acquire))
    }

    pub fn write_state(&self) -> WriteState {
        if !self.is_connected() {
            return WriteState::Closed;
        }
        WriteState::from_u8(self.write_state.load(Ordering::Acquire))
    }

    /// Messages queued but not yet picked up by the write loop.
    pub fn outgoing_len(&self) -> usize {
        self.outgoing.len()
    }

    /// Queue a message for transmission.
    ///
    /// Messages from one connection go out in the order they were sent and
    /// are never interleaved. Sending before the connection starts is
    /// allowed; the queue is flushed once the write loop runs.
    pub fn send(&self, msg: Message<T>) -> Result<()> {
        if !self.is_connected() {
            return Err(PeerError::NotConnected);
        }
        self.outgoing.push_back(msg);
        self.write_ready.notify_one();
        Ok(())
    }

    /// Close the connection. Idempotent.
    pub fn close(&self) {
        self.close_with(CloseReason::Local);
    }

    pub(crate) fn assign_id(&self, id: u32) {
        self.id.store(id, Ordering::Release);
    }

    /// Install the owner's notification, called once with the id on close.
    pub(crate) fn set_close_hook(&self, hook: impl FnOnce(u32) + Send + 'static) {
        *self.on_close.lock() = Some(Box::new(hook));
    }

    /// Spawn the read and write loops on the reactor.
    pub(crate) fn start(self: &Arc<Self>, handle: &Handle) -> Result<()> {
        if !self.is_connected() {
            return Err(PeerError::NotConnected);
        }
        let stream = self.stream.lock().take().ok_or(PeerError::AlreadyStarted)?;
        let (reader, writer) = stream.into_split();

        debug!(
            connection = self.id(),
            owner = ?self.owner,
            peer = ?self.peer_addr,
            "connection started"
        );

        handle.spawn(Arc::clone(self).read_loop(reader));
        handle.spawn(Arc::clone(self).write_loop(writer));
        Ok(())
    }

    async fn read_loop(self: Arc<Self>, mut reader: OwnedReadHalf) {
        let mut header_buf = vec![0u8; header_size::<T>()];

        let reason = loop {
            self.set_read_state(ReadState::ReadingHeader);
            if let Err(reason) = self.read_exact(&mut reader, &mut header_buf).await {
                break reason;
            }

            let header = match decode_header::<T>(&header_buf)
                .and_then(|header| self.config.frame.check_header(&header).map(|()| header))
            {
                Ok(header) => header,
                Err(err) => break CloseReason::Framing(err),
            };

            let mut body = Vec::new();
            if header.size > 0 {
                self.set_read_state(ReadState::ReadingBody);
                body.resize(header.size as usize, 0);
                if let Err(reason) = self.read_exact(&mut reader, &mut body).await {
                    break reason;
                }
            }

            self.set_read_state(ReadState::Dispatching);
            match Message::from_parts(header, body) {
                Ok(msg) => {
                    trace!(connection = self.id(), id = ?msg.id(), size = msg.size(), "message read");
                    self.dispatch(msg);
                }
                Err(err) => break CloseReason::Framing(err),
            }
        };

        self.close_with(reason);
    }

    async fn write_loop(self: Arc<Self>, mut writer: OwnedWriteHalf) {
        let mut header_buf = BytesMut::with_capacity(header_size::<T>());

        let reason = 'outer: loop {
            while let Some(msg) = self.outgoing.pop_front() {
                self.set_write_state(WriteState::WritingHeader);
                header_buf.clear();
                encode_header(msg.header(), &mut header_buf);
                if let Err(reason) = self.write_all(&mut writer, &header_buf).await {
                    break 'outer reason;
                }

                if !msg.is_empty() {
                    self.set_write_state(WriteState::WritingBody);
                    if let Err(reason) = self.write_all(&mut writer, msg.body()).await {
                        break 'outer reason;
                    }
                }
                trace!(connection = self.id(), id = ?msg.id(), size = msg.size(), "message written");
            }

            self.set_write_state(WriteState::Idle);
            tokio::select! {
                _ = self.cancel.cancelled() => break 'outer CloseReason::Local,
                _ = self.write_ready.notified() => {}
            }
        };

        let _ = writer.shutdown().await;
        self.close_with(reason);
    }

    async fn read_exact(
        &self,
        reader: &mut OwnedReadHalf,
        buf: &mut [u8],
    ) -> std::result::Result<(), CloseReason> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(CloseReason::Local),
            res = reader.read_exact(buf) => res.map(|_| ()).map_err(CloseReason::from_io),
        }
    }

    async fn write_all(
        &self,
        writer: &mut OwnedWriteHalf,
        buf: &[u8],
    ) -> std::result::Result<(), CloseReason> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(CloseReason::Local),
            res = writer.write_all(buf) => res.map_err(CloseReason::from_io),
        }
    }

    fn dispatch(self: &Arc<Self>, msg: Message<T>) {
        let remote_id = match self.owner {
            Owner::Server => Some(self.id()),
            Owner::Client => None,
        };
        let owned = OwnedMessage::new(self, remote_id, msg);
        match self.config.dispatch {
            Dispatch::Back => self.incoming.push_back(owned),
            Dispatch::Front => self.incoming.push_front(owned),
        }
    }

    fn set_read_state(&self, state: ReadState) {
        if self.is_connected() {
            self.read_state.store(state as u8, Ordering::Release);
        }
    }

    fn set_write_state(&self, state: WriteState) {
        if self.is_connected() {
            self.write_state.store(state as u8, Ordering::Release);
        }
    }

    fn close_with(&self, reason: CloseReason) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.read_state.store(ReadState::Closed as u8, Ordering::Release);
        self.write_state.store(WriteState::Closed as u8, Ordering::Release);
        self.cancel.cancel();
        drop(self.stream.lock().take());

        let id = self.id();
        match reason {
            CloseReason::Local => debug!(connection = id, "connection closed"),
            CloseReason::PeerClosed => debug!(connection = id, "peer closed connection"),
            CloseReason::Io(err) => debug!(connection = id, error = %err, "connection I/O failed"),
            CloseReason::Framing(err) => {
                warn!(connection = id, error = %err, "framing error, closing connection")
            }
        }

        let hook = self.on_close.lock().take();
        if let Some(hook) = hook {
            hook(id);
        }
    }
}

impl<T: MessageId> std::fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id())
            .field("owner", &self.owner)
            .field("peer_addr", &self.peer_addr)
            .field("read_state", &self.read_state())
            .field("write_state", &self.write_state())
            .finish()
    }
}
