/// Errors that can occur in peer operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] msgnet_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] msgnet_frame::FrameError),

    /// There is no live connection to send on.
    #[error("not connected")]
    NotConnected,

    /// Connecting took longer than the configured limit.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(std::time::Duration),

    /// The connection or server was already started.
    #[error("already started")]
    AlreadyStarted,
}

pub type Result<T> = std::result::Result<T, PeerError>;
