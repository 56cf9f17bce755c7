//! Typed message framing for msgnet.
//!
//! Every message on the wire is a fixed-size header followed by its body:
//! - the message id, stored as the application's `MessageId::Repr`
//! - a 4-byte body size
//! - the body bytes
//!
//! Bodies are built and consumed like a stack of fixed-layout values; see
//! [`Message::append`] and [`Message::extract`].

pub mod codec;
pub mod error;
pub mod message;

pub use codec::{
    decode_header, decode_message, encode_header, encode_message, header_size, FrameConfig,
    DEFAULT_MAX_BODY, SIZE_FIELD_LEN,
};
pub use error::{FrameError, Result};
pub use message::{Message, MessageHeader, MessageId};
