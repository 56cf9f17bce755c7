//! Demo chat protocol spoken by the `msgnet` CLI.
//!
//! Clients are greeted with [`DemoMessage::ServerAccept`]. A
//! [`DemoMessage::ServerPing`] is bounced back unchanged, so a client can
//! stamp it with its own clock and time the round trip. A
//! [`DemoMessage::MessageAll`] is turned into a
//! [`DemoMessage::ServerMessage`] carrying the sender's id and fanned out to
//! every other client.

use std::sync::Arc;

use msgnet_frame::{Message, MessageId};
use msgnet_peer::{Connection, HandlerResult, ServerContext, ServerHandler};

/// Message ids of the demo protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum DemoMessage {
    ServerAccept = 0,
    /// Reserved for servers that reject with an explanation.
    ServerDeny = 1,
    ServerPing = 2,
    MessageAll = 3,
    ServerMessage = 4,
}

impl DemoMessage {
    pub const ALL: [DemoMessage; 5] = [
        DemoMessage::ServerAccept,
        DemoMessage::ServerDeny,
        DemoMessage::ServerPing,
        DemoMessage::MessageAll,
        DemoMessage::ServerMessage,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DemoMessage::ServerAccept => "ServerAccept",
            DemoMessage::ServerDeny => "ServerDeny",
            DemoMessage::ServerPing => "ServerPing",
            DemoMessage::MessageAll => "MessageAll",
            DemoMessage::ServerMessage => "ServerMessage",
        }
    }
}

impl MessageId for DemoMessage {
    type Repr = u32;

    fn into_repr(self) -> u32 {
        self as u32
    }

    fn from_repr(repr: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| *kind as u32 == repr)
    }
}

/// Server side of the demo protocol.
#[derive(Debug, Default)]
pub struct DemoServer {
    max_clients: Option<usize>,
    active: usize,
    pings: u64,
    broadcasts: u64,
}

impl DemoServer {
    pub fn new(max_clients: Option<usize>) -> Self {
        Self {
            max_clients,
            ..Self::default()
        }
    }

    pub fn active_clients(&self) -> usize {
        self.active
    }

    pub fn pings(&self) -> u64 {
        self.pings
    }

    pub fn broadcasts(&self) -> u64 {
        self.broadcasts
    }
}

impl ServerHandler<DemoMessage> for DemoServer {
    fn on_client_connect(&mut self, client: &Arc<Connection<DemoMessage>>) -> bool {
        if self.max_clients.is_some_and(|max| self.active >= max) {
            return false;
        }
        if client.send(Message::new(DemoMessage::ServerAccept)).is_err() {
            return false;
        }
        self.active += 1;
        true
    }

    fn on_client_disconnect(&mut self, _client: &Arc<Connection<DemoMessage>>) {
        self.active = self.active.saturating_sub(1);
    }

    fn on_message(
        &mut self,
        ctx: &ServerContext<DemoMessage>,
        client: &Arc<Connection<DemoMessage>>,
        msg: Message<DemoMessage>,
    ) -> HandlerResult {
        match msg.id() {
            DemoMessage::ServerPing => {
                self.pings += 1;
                ctx.message_client(client, msg);
            }
            DemoMessage::MessageAll => {
                self.broadcasts += 1;
                let mut out = Message::new(DemoMessage::ServerMessage);
                out.append(&client.id())?;
                ctx.message_all_clients(&out, Some(client));
            }
            other => return Err(format!("unexpected {} from client", other.name()).into()),
        }
        Ok(())
    }
}
