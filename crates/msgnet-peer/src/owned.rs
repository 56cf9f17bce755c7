use std::fmt;
use std::sync::{Arc, Weak};

use msgnet_frame::{Message, MessageId};

use crate::connection::Connection;

/// A received message tagged with the connection it arrived on.
///
/// On a server the remote is the client that sent it; on a client it is the
/// server. The association is weak: by the time the message is popped the
/// connection may be closing or gone.
pub struct OwnedMessage<T: MessageId> {
    remote: Weak<Connection<T>>,
    remote_id: Option<u32>,
    /// The message itself.
    pub msg: Message<T>,
}

impl<T: MessageId> OwnedMessage<T> {
    pub(crate) fn new(remote: &Arc<Connection<T>>, remote_id: Option<u32>, msg: Message<T>) -> Self {
        Self {
            remote: Arc::downgrade(remote),
            remote_id,
            msg,
        }
    }

    /// The connection this message arrived on, if it is still alive.
    pub fn remote(&self) -> Option<Arc<Connection<T>>> {
        self.remote.upgrade()
    }

    /// Server-assigned id of the sender, captured at receive time.
    ///
    /// Always `None` for messages received by a client.
    pub fn remote_id(&self) -> Option<u32> {
        self.remote_id
    }

    pub fn into_message(self) -> Message<T> {
        self.msg
    }
}

impl<T: MessageId> fmt::Display for OwnedMessage<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.msg, f)
    }
}

impl<T: MessageId> fmt::Debug for OwnedMessage<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedMessage")
            .field("remote_id", &self.remote_id)
            .field("msg", &self.msg)
            .finish()
    }
}
