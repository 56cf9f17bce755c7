//! Client and server roles for msgnet.
//!
//! A [`Connection`] runs the framed read/write protocol over one TCP stream
//! on a reactor owned by its [`Client`] or [`Server`]. Everything a peer
//! receives is pushed onto a shared [`ConcurrentQueue`] of
//! [`OwnedMessage`]s, so application code runs on its own thread without
//! locks:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use msgnet_frame::Message;
//! use msgnet_peer::{Connection, HandlerResult, Server, ServerConfig, ServerContext, ServerHandler};
//!
//! struct Echo;
//!
//! impl ServerHandler<u32> for Echo {
//!     fn on_message(
//!         &mut self,
//!         ctx: &ServerContext<u32>,
//!         client: &Arc<Connection<u32>>,
//!         msg: Message<u32>,
//!     ) -> HandlerResult {
//!         ctx.message_client(client, msg);
//!         Ok(())
//!     }
//! }
//!
//! let mut server = Server::new(ServerConfig::default(), Echo)?;
//! server.start()?;
//! loop {
//!     server.update(-1, true);
//! }
//! # Ok::<(), msgnet_peer::PeerError>(())
//! ```

pub mod client;
pub mod connection;
pub mod error;
pub mod owned;
pub mod server;

pub use client::{Client, ClientConfig};
pub use connection::{Connection, ConnectionConfig, Dispatch, Owner, ReadState, WriteState};
pub use error::{PeerError, Result};
pub use msgnet_queue::ConcurrentQueue;
pub use owned::OwnedMessage;
pub use server::{HandlerResult, Server, ServerConfig, ServerContext, ServerHandler};
