//! TCP transport and reactor for msgnet.
//!
//! This is the lowest layer of msgnet. It provides:
//! - [`Reactor`]: an explicitly owned async I/O runtime whose worker
//!   threads run every connect, accept, read and write
//! - [`TcpAcceptor`] and [`connect`]: the TCP endpoints that produce
//!   connected [`tokio::net::TcpStream`]s
//!
//! Everything else builds on the streams and the reactor handle provided here.

pub mod error;
pub mod reactor;
pub mod tcp;

pub use error::{Result, TransportError};
pub use reactor::{Reactor, ReactorConfig};
pub use tcp::{connect, TcpAcceptor};
