use bytes::{Buf, BufMut, BytesMut};

use crate::error::{FrameError, Result};
use crate::message::{Message, MessageHeader, MessageId};

/// Width of the header's body-size field.
pub const SIZE_FIELD_LEN: usize = 4;

/// Default maximum accepted body size: 16 MiB.
pub const DEFAULT_MAX_BODY: usize = 16 * 1024 * 1024;

/// Wire size of a header for message ids of type `T`.
pub fn header_size<T: MessageId>() -> usize {
    std::mem::size_of::<T::Repr>() + SIZE_FIELD_LEN
}

/// Encode a header into the wire format.
///
/// Wire format:
/// ```text
/// ┌─────────────────────┬──────────────┬──────────────────┐
/// │ Id                  │ Size         │ Body             │
/// │ (size_of Repr, NE)  │ (4B u32, NE) │ (Size bytes)     │
/// └─────────────────────┴──────────────┴──────────────────┘
/// ```
///
/// Both fields are host byte order with no padding between them. Peers must
/// share endianness; there is no delimiter, so framing depends entirely on
/// `size` being right.
pub fn encode_header<T: MessageId>(header: &MessageHeader<T>, dst: &mut BytesMut) {
    let repr = header.id.into_repr();
    dst.reserve(header_size::<T>());
    dst.put_slice(bytemuck::bytes_of(&repr));
    dst.put_slice(&header.size.to_ne_bytes());
}

/// Decode a header from the front of `src`.
pub fn decode_header<T: MessageId>(src: &[u8]) -> Result<MessageHeader<T>> {
    let expected = header_size::<T>();
    if src.len() < expected {
        return Err(FrameError::IncompleteHeader {
            got: src.len(),
            expected,
        });
    }

    let id_len = expected - SIZE_FIELD_LEN;
    let repr: T::Repr = bytemuck::pod_read_unaligned(&src[..id_len]);
    let id = T::from_repr(repr).ok_or_else(|| FrameError::UnknownMessageId(format!("{repr:?}")))?;

    let mut size = [0u8; SIZE_FIELD_LEN];
    size.copy_from_slice(&src[id_len..expected]);

    Ok(MessageHeader {
        id,
        size: u32::from_ne_bytes(size),
    })
}

/// Encode a whole message (header then body).
pub fn encode_message<T: MessageId>(msg: &Message<T>, dst: &mut BytesMut) {
    dst.reserve(header_size::<T>() + msg.size());
    encode_header(msg.header(), dst);
    dst.put_slice(msg.body());
}

/// Decode one message from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete message yet.
/// On success, consumes the message bytes from the buffer.
pub fn decode_message<T: MessageId>(
    src: &mut BytesMut,
    max_body: usize,
) -> Result<Option<Message<T>>> {
    let header_len = header_size::<T>();
    if src.len() < header_len {
        return Ok(None);
    }

    let header = decode_header::<T>(&src[..header_len])?;
    let body_len = header.size as usize;
    check_body_size(body_len, max_body)?;

    if src.len() < header_len + body_len {
        return Ok(None);
    }

    src.advance(header_len);
    let body = src.split_to(body_len).to_vec();
    Message::from_parts(header, body).map(Some)
}

fn check_body_size(size: usize, max: usize) -> Result<()> {
    if size > max {
        return Err(FrameError::BodyTooLarge { size, max });
    }
    Ok(())
}

/// Configuration for the message codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Largest body a peer may announce, in bytes. Default: 16 MiB.
    pub max_body_size: usize,
}

impl FrameConfig {
    /// Reject a header announcing more than `max_body_size` bytes.
    pub fn check_header<T: MessageId>(&self, header: &MessageHeader<T>) -> Result<()> {
        check_body_size(header.size as usize, self.max_body_size)
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_body_size: DEFAULT_MAX_BODY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Kind {
        Ping,
        Data,
    }

    impl MessageId for Kind {
        type Repr = u32;

        fn into_repr(self) -> u32 {
            self as u32
        }

        fn from_repr(repr: u32) -> Option<Self> {
            match repr {
                0 => Some(Kind::Ping),
                1 => Some(Kind::Data),
                _ => None,
            }
        }
    }

    #[test]
    fn header_size_tracks_repr_width() {
        assert_eq!(header_size::<u8>(), 5);
        assert_eq!(header_size::<u16>(), 6);
        assert_eq!(header_size::<Kind>(), 8);
        assert_eq!(header_size::<u64>(), 12);
    }

    #[test]
    fn header_bytes_are_host_order() {
        let mut buf = BytesMut::new();
        encode_header(&MessageHeader { id: Kind::Data, size: 5 }, &mut buf);

        let mut expected = Vec::new();
        expected.extend_from_slice(&1u32.to_ne_bytes());
        expected.extend_from_slice(&5u32.to_ne_bytes());
        assert_eq!(buf.as_ref(), expected.as_slice());
    }

    #[test]
    fn decode_header_reads_encoded_fields() {
        let mut buf = BytesMut::new();
        encode_header(&MessageHeader { id: Kind::Ping, size: 77 }, &mut buf);

        let header = decode_header::<Kind>(&buf).unwrap();
        assert_eq!(header.id, Kind::Ping);
        assert_eq!(header.size, 77);
    }

    #[test]
    fn decode_header_rejects_unknown_id() {
        let mut buf = BytesMut::new();
        encode_header(&MessageHeader { id: 9u32, size: 0 }, &mut buf);

        let err = decode_header::<Kind>(&buf).unwrap_err();
        assert!(matches!(err, FrameError::UnknownMessageId(ref id) if id == "9"));
    }

    #[test]
    fn decode_header_rejects_short_input() {
        let err = decode_header::<Kind>(&[0, 0, 0]).unwrap_err();
        assert!(matches!(
            err,
            FrameError::IncompleteHeader {
                got: 3,
                expected: 8
            }
        ));
    }

    #[test]
    fn decode_incomplete_body() {
        let mut msg = Message::new(Kind::Data);
        msg.append_bytes(b"hello").unwrap();

        let mut buf = BytesMut::new();
        encode_message(&msg, &mut buf);
        buf.truncate(header_size::<Kind>() + 2);

        let result = decode_message::<Kind>(&mut buf, DEFAULT_MAX_BODY).unwrap();
        assert!(result.is_none());
        assert_eq!(buf.len(), header_size::<Kind>() + 2);
    }

    #[test]
    fn decode_body_too_large() {
        let mut buf = BytesMut::new();
        encode_header(
            &MessageHeader {
                id: Kind::Data,
                size: 1024,
            },
            &mut buf,
        );

        let result = decode_message::<Kind>(&mut buf, 16);
        assert!(matches!(
            result,
            Err(FrameError::BodyTooLarge { size: 1024, max: 16 })
        ));
    }

    #[test]
    fn consecutive_messages_do_not_bleed() {
        let mut first = Message::new(Kind::Data);
        first.append_bytes(b"first").unwrap();
        let second = Message::new(Kind::Ping);
        let mut third = Message::new(Kind::Data);
        third.append(&0xABCD_u16).unwrap();

        let mut buf = BytesMut::new();
        encode_message(&first, &mut buf);
        encode_message(&second, &mut buf);
        encode_message(&third, &mut buf);

        let d1 = decode_message::<Kind>(&mut buf, DEFAULT_MAX_BODY).unwrap().unwrap();
        let d2 = decode_message::<Kind>(&mut buf, DEFAULT_MAX_BODY).unwrap().unwrap();
        let d3 = decode_message::<Kind>(&mut buf, DEFAULT_MAX_BODY).unwrap().unwrap();

        assert_eq!(d1, first);
        assert_eq!(d2, second);
        assert!(d2.is_empty());
        assert_eq!(d3, third);
        assert!(buf.is_empty());
    }

    #[test]
    fn frame_config_checks_header() {
        let cfg = FrameConfig { max_body_size: 4 };
        assert!(cfg.check_header(&MessageHeader { id: 0u8, size: 4 }).is_ok());
        assert!(matches!(
            cfg.check_header(&MessageHeader { id: 0u8, size: 5 }),
            Err(FrameError::BodyTooLarge { .. })
        ));
    }
}
