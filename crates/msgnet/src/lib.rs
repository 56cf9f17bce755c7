//! Typed, framed peer-to-peer messaging over TCP.
//!
//! Applications define a closed set of message ids, build bodies by pushing
//! fixed-layout values onto a [`frame::Message`], and exchange them through a
//! [`peer::Client`] or a [`peer::Server`]. All network I/O runs on a reactor
//! owned by the client or server; received messages wait on a thread-safe
//! queue until the application drains them.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP acceptor, connector and the explicitly owned reactor
//! - [`frame`]: message type, header layout and the wire codec
//! - [`queue`]: the blocking double-ended queue shared with I/O threads
//! - [`peer`]: connection state machine, client and server (behind `peer`)
//! - [`demo`]: a small chat/ping protocol used by the CLI (behind `peer`)

/// Re-export transport types.
pub mod transport {
    pub use msgnet_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use msgnet_frame::*;
}

/// Re-export queue types.
pub mod queue {
    pub use msgnet_queue::*;
}

/// Re-export peer types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use msgnet_peer::*;
}

#[cfg(feature = "peer")]
pub mod demo;
