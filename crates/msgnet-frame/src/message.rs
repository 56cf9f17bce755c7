use std::fmt;

use bytemuck::Pod;

use crate::error::{FrameError, Result};

/// An application-defined, closed set of message type tags.
///
/// `Repr` is the fixed-layout storage the tag occupies on the wire. Tags that
/// do not map back through [`MessageId::from_repr`] are rejected when a
/// header is decoded.
///
/// ```
/// use msgnet_frame::MessageId;
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// enum Chat {
///     Hello,
///     Text,
/// }
///
/// impl MessageId for Chat {
///     type Repr = u32;
///
///     fn into_repr(self) -> u32 {
///         self as u32
///     }
///
///     fn from_repr(repr: u32) -> Option<Self> {
///         match repr {
///             0 => Some(Chat::Hello),
///             1 => Some(Chat::Text),
///             _ => None,
///         }
///     }
/// }
/// ```
pub trait MessageId: Copy + Send + Sync + fmt::Debug + 'static {
    /// Wire storage for the tag.
    type Repr: Pod + fmt::Debug;

    fn into_repr(self) -> Self::Repr;

    fn from_repr(repr: Self::Repr) -> Option<Self>;
}

macro_rules! impl_message_id_for_int {
    ($($ty:ty),*) => {
        $(
            impl MessageId for $ty {
                type Repr = $ty;

                fn into_repr(self) -> $ty {
                    self
                }

                fn from_repr(repr: $ty) -> Option<Self> {
                    Some(repr)
                }
            }
        )*
    };
}

impl_message_id_for_int!(u8, u16, u32, u64);

/// Header sent ahead of every message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader<T> {
    /// Message type tag.
    pub id: T,
    /// Body length in bytes.
    pub size: u32,
}

impl<T: MessageId> MessageHeader<T> {
    /// A header for an empty body.
    pub fn new(id: T) -> Self {
        Self { id, size: 0 }
    }
}

/// A typed message: header plus a variable-length byte body.
///
/// The body works like a stack. [`Message::append`] pushes a fixed-layout
/// value onto the end and [`Message::extract`] pops one off the end, so
/// values come back in the reverse of the order they went in. `header.size`
/// always equals the body length.
///
/// ```
/// use msgnet_frame::Message;
///
/// let mut msg = Message::new(7u32);
/// msg.append(&1u8)?.append(&2.5f32)?;
/// assert_eq!(msg.header().size, 5);
///
/// let b: f32 = msg.extract()?;
/// let a: u8 = msg.extract()?;
/// assert_eq!((a, b), (1, 2.5));
/// assert!(msg.is_empty());
/// # Ok::<(), msgnet_frame::FrameError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message<T> {
    header: MessageHeader<T>,
    body: Vec<u8>,
}

impl<T: MessageId> Message<T> {
    /// Create an empty message with the given tag.
    pub fn new(id: T) -> Self {
        Self {
            header: MessageHeader::new(id),
            body: Vec::new(),
        }
    }

    /// Assemble a message from a decoded header and its body.
    pub fn from_parts(header: MessageHeader<T>, body: Vec<u8>) -> Result<Self> {
        if header.size as usize != body.len() {
            return Err(FrameError::SizeMismatch {
                header: header.size,
                body: body.len(),
            });
        }
        Ok(Self { header, body })
    }

    pub fn header(&self) -> &MessageHeader<T> {
        &self.header
    }

    pub fn id(&self) -> T {
        self.header.id
    }

    /// Retag the message; the body is left untouched.
    pub fn set_id(&mut self, id: T) {
        self.header.id = id;
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body size in bytes.
    pub fn size(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Push a fixed-layout value onto the end of the body.
    ///
    /// Returns the message so appends can be chained.
    pub fn append<V: Pod>(&mut self, value: &V) -> Result<&mut Self> {
        self.append_bytes(bytemuck::bytes_of(value))
    }

    /// Pop a fixed-layout value off the end of the body.
    ///
    /// Values must be extracted in the reverse of the order they were
    /// appended. A mismatched type reinterprets whatever bytes sit at the
    /// tail; that is not detected. Asking for more bytes than remain is an
    /// [`FrameError::Underflow`] and leaves the message unchanged.
    pub fn extract<V: Pod>(&mut self) -> Result<V> {
        let start = self.tail_start(std::mem::size_of::<V>())?;
        let value = bytemuck::pod_read_unaligned(&self.body[start..]);
        self.truncate_to(start);
        Ok(value)
    }

    /// Push raw bytes onto the end of the body.
    pub fn append_bytes(&mut self, bytes: &[u8]) -> Result<&mut Self> {
        let size = self.body.len() + bytes.len();
        if size > u32::MAX as usize {
            return Err(FrameError::BodyTooLarge {
                size,
                max: u32::MAX as usize,
            });
        }
        self.body.extend_from_slice(bytes);
        self.header.size = size as u32;
        Ok(self)
    }

    /// Pop `len` raw bytes off the end of the body.
    pub fn extract_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let start = self.tail_start(len)?;
        let bytes = self.body.split_off(start);
        self.header.size = start as u32;
        Ok(bytes)
    }

    /// Drop the whole body.
    pub fn clear(&mut self) {
        self.truncate_to(0);
    }

    /// Consume the message, returning its header and body.
    pub fn into_parts(self) -> (MessageHeader<T>, Vec<u8>) {
        (self.header, self.body)
    }

    fn tail_start(&self, needed: usize) -> Result<usize> {
        let available = self.body.len();
        available
            .checked_sub(needed)
            .ok_or(FrameError::Underflow { needed, available })
    }

    fn truncate_to(&mut self, len: usize) {
        self.body.truncate(len);
        self.header.size = len as u32;
    }
}

impl<T: MessageId> fmt::Display for Message<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ID:{:?} Size:{}", self.header.id, self.header.size)
    }
}

#[cfg(test)]
mod tests {
    use bytemuck::{Pod, Zeroable};
    use proptest::prelude::*;

    use super::*;

    #[repr(C)]
    #[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
    struct Position {
        x: f32,
        y: f32,
    }

    #[test]
    fn new_message_is_empty() {
        let msg = Message::new(3u32);
        assert_eq!(msg.id(), 3);
        assert_eq!(msg.size(), 0);
        assert_eq!(msg.header().size, 0);
        assert!(msg.is_empty());
    }

    #[test]
    fn chained_appends_extract_in_reverse() {
        let mut msg = Message::new(1u16);
        let pos = Position { x: 1.5, y: -2.0 };
        msg.append(&42u32)
            .unwrap()
            .append(&1u8)
            .unwrap()
            .append(&pos)
            .unwrap();

        assert_eq!(msg.size(), 4 + 1 + 8);
        assert_eq!(msg.header().size as usize, msg.size());

        assert_eq!(msg.extract::<Position>().unwrap(), pos);
        assert_eq!(msg.extract::<u8>().unwrap(), 1);
        assert_eq!(msg.extract::<u32>().unwrap(), 42);
        assert!(msg.is_empty());
        assert_eq!(msg.header().size, 0);
    }

    #[test]
    fn extract_from_empty_body_underflows() {
        let mut msg = Message::new(0u8);
        let err = msg.extract::<u32>().unwrap_err();
        assert!(matches!(
            err,
            FrameError::Underflow {
                needed: 4,
                available: 0
            }
        ));
    }

    #[test]
    fn underflow_leaves_body_untouched() {
        let mut msg = Message::new(0u8);
        msg.append(&7u16).unwrap();

        assert!(msg.extract::<u64>().is_err());
        assert_eq!(msg.size(), 2);
        assert_eq!(msg.extract::<u16>().unwrap(), 7);
    }

    #[test]
    fn byte_slices_follow_stack_order() {
        let mut msg = Message::new(9u32);
        msg.append_bytes(b"hello").unwrap();
        msg.append(&5u32).unwrap();

        let len = msg.extract::<u32>().unwrap() as usize;
        let text = msg.extract_bytes(len).unwrap();
        assert_eq!(text, b"hello");
        assert!(msg.is_empty());
        assert!(msg.extract_bytes(1).is_err());
    }

    #[test]
    fn from_parts_rejects_size_mismatch() {
        let header = MessageHeader { id: 1u32, size: 3 };
        let err = Message::from_parts(header, vec![0; 2]).unwrap_err();
        assert!(matches!(err, FrameError::SizeMismatch { header: 3, body: 2 }));

        let ok = Message::from_parts(header, vec![1, 2, 3]).unwrap();
        assert_eq!(ok.body(), &[1, 2, 3]);
    }

    #[test]
    fn clear_resets_size() {
        let mut msg = Message::new(2u32);
        msg.append(&[0u8; 16]).unwrap();
        msg.clear();
        assert!(msg.is_empty());
        assert_eq!(msg.header().size, 0);
    }

    #[test]
    fn display_shows_id_and_size() {
        let mut msg = Message::new(4u32);
        msg.append(&1u64).unwrap();
        assert_eq!(msg.to_string(), "ID:4 Size:8");
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Item {
        Byte(u8),
        Short(i16),
        Word(u32),
        Long(u64),
        Triple([u8; 3]),
    }

    fn value_strategy() -> impl Strategy<Value = Item> {
        prop_oneof![
            any::<u8>().prop_map(Item::Byte),
            any::<i16>().prop_map(Item::Short),
            any::<u32>().prop_map(Item::Word),
            any::<u64>().prop_map(Item::Long),
            any::<[u8; 3]>().prop_map(Item::Triple),
        ]
    }

    fn push(msg: &mut Message<u32>, value: &Item) {
        match value {
            Item::Byte(v) => msg.append(v),
            Item::Short(v) => msg.append(v),
            Item::Word(v) => msg.append(v),
            Item::Long(v) => msg.append(v),
            Item::Triple(v) => msg.append(v),
        }
        .unwrap();
    }

    fn pop_like(msg: &mut Message<u32>, template: &Item) -> Item {
        match template {
            Item::Byte(_) => Item::Byte(msg.extract().unwrap()),
            Item::Short(_) => Item::Short(msg.extract().unwrap()),
            Item::Word(_) => Item::Word(msg.extract().unwrap()),
            Item::Long(_) => Item::Long(msg.extract().unwrap()),
            Item::Triple(_) => Item::Triple(msg.extract().unwrap()),
        }
    }

    proptest! {
        #[test]
        fn extract_returns_appended_values_in_stack_order(
            values in proptest::collection::vec(value_strategy(), 0..32)
        ) {
            let mut msg = Message::new(0u32);
            for value in &values {
                push(&mut msg, value);
                prop_assert_eq!(msg.header().size as usize, msg.body().len());
            }

            for value in values.iter().rev() {
                let popped = pop_like(&mut msg, value);
                prop_assert_eq!(&popped, value);
                prop_assert_eq!(msg.header().size as usize, msg.body().len());
            }

            prop_assert_eq!(msg.header().size, 0);
            prop_assert!(msg.body().is_empty());
        }
    }
}
